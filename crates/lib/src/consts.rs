pub const APP_NAME: &str = "carbox";

/// Eclipse nature that marks a project as a distribution (CAR) project.
pub const DISTRIBUTION_NATURE: &str = "org.wso2.developerstudio.eclipse.distribution.project.nature";

/// Package descriptor every distribution project must expose.
pub const DESCRIPTOR_FILE: &str = "pom.xml";

/// Eclipse project metadata file.
pub const PROJECT_FILE: &str = ".project";

/// Workspace-level list of closed project names, one per line.
pub const CLOSED_PROJECTS_FILE: &str = ".closed";

/// Extension of packaged carbon application archives.
pub const ARCHIVE_EXTENSION: &str = "car";

/// Directory the packaging step writes its output into.
pub const PACKAGING_OUTPUT_DIR: &str = "target";

/// Default capacity of the pipeline event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

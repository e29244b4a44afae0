use anyhow::Result;

use carbox_lib::config::PipelineConfig;
use carbox_lib::daemon::Endpoint;
use carbox_lib::platform::{HostFamily, Os, paths};

use crate::output::{self, OutputFormat};

pub fn cmd_info(output: OutputFormat) -> Result<()> {
  let os = Os::current().map(|os| os.as_str()).unwrap_or("unknown");
  let family = HostFamily::current();
  let endpoint = Endpoint::for_host(family);
  let config_file = paths::config_file();
  let defaults = PipelineConfig::default();

  if output.is_json() {
    return output::json(&serde_json::json!({
      "version": env!("CARGO_PKG_VERSION"),
      "os": os,
      "host_family": family.as_str(),
      "endpoint": endpoint,
      "config_file": config_file,
      "marker": defaults.marker,
    }));
  }

  println!("carbox v{}", env!("CARGO_PKG_VERSION"));
  output::field("OS", os);
  output::field("Host family", family);
  output::field("Daemon endpoint", endpoint.as_str());
  match &config_file {
    Some(path) => output::field("Config file", path.display()),
    None => output::field("Config file", "unavailable"),
  }
  output::field("Distribution marker", &defaults.marker);
  Ok(())
}

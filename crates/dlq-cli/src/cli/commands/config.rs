//! `dlq config` – show where the config lives and what is in effect.

use anyhow::Result;
use dlq_core::config::{self, DlqConfig};

pub fn run_config(cfg: &DlqConfig) -> Result<()> {
    let path = config::config_path()?;
    let policy = cfg.retry_policy();
    let http = cfg.http_options();

    println!("config file:      {}", path.display());
    println!("capacity:         {}", cfg.effective_capacity());
    println!("release order:    {:?}", cfg.effective_release_order());
    println!("max attempts:     {}", policy.max_attempts);
    println!("retry wait:       {:.1}s", policy.wait.as_secs_f64());
    println!("user agent:       {}", http.user_agent);
    println!("connect timeout:  {}s", http.connect_timeout.as_secs());
    println!("timeout:          {}s", http.timeout.as_secs());
    println!("overwrite files:  {}", http.overwrite_existing);
    for (name, value) in &http.headers {
        println!("header:           {}: {}", name, value);
    }
    Ok(())
}

//! The `post` command: one posting cycle for a single platform

use anyhow::Result;

use crate::config::Config;
use crate::models::Platform;

use super::{post_cycle, AppContext};

/// Run one rotation-and-post cycle for a platform
pub async fn post(config: Config, platform: Platform) -> Result<()> {
    let ctx = AppContext::build(config)?;

    if post_cycle(&ctx, platform).await? {
        println!("Posted one item to {}", platform.display_name());
    } else {
        println!(
            "Nothing posted to {} (no content, cooldown, or limit reached)",
            platform.display_name()
        );
    }

    Ok(())
}

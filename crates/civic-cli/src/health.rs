//! `self-test` and `health` subcommands.

use std::io::Write;

use anyhow::{Context, Result};
use civic_fields::EncryptionService;
use civic_hsm::HsmTransport;

use crate::write_json;

/// Exit code when the HSM is configured but unreachable.
pub const EXIT_UNHEALTHY: u8 = 2;

/// Authenticate and round-trip the probe value, then print the health report.
pub async fn run_self_test<T: HsmTransport>(
    service: &EncryptionService<T>,
    out: &mut dyn Write,
) -> Result<u8> {
    if !service.is_enabled() {
        writeln!(out, "encryption disabled: no FORTANIX_* variables set")?;
        return Ok(0);
    }
    service
        .initialize()
        .await
        .context("encryption self-test failed")?;
    writeln!(out, "encryption self-test passed")?;
    write_json(out, &service.health_check().await)?;
    Ok(0)
}

/// Print the health report. Exit [`EXIT_UNHEALTHY`] unless healthy or disabled.
pub async fn run_health<T: HsmTransport>(
    service: &EncryptionService<T>,
    out: &mut dyn Write,
) -> Result<u8> {
    let status = service.health_check().await;
    write_json(out, &status)?;
    Ok(if status.is_serving() { 0 } else { EXIT_UNHEALTHY })
}

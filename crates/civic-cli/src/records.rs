//! # Record Subcommands
//!
//! `encode` and `decode` run record files through the storage codec, for
//! migrating legacy plaintext exports or inspecting a database dump.
//! `analytics` reads public fields only and never contacts the HSM.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use civic_fields::{analytics, EncryptionService, EntityKind};
use civic_hsm::HsmTransport;

use crate::{write_json, Batch};

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Entity kind: `citizen` or `service-request`.
    #[arg(long)]
    pub kind: EntityKind,

    /// JSON file with one record or an array of records.
    pub file: PathBuf,
}

/// Entity views in, storage records out. Stops at the first record that
/// fails to encrypt; nothing is written in that case.
pub async fn run_encode<T: HsmTransport>(
    args: &RecordArgs,
    service: &EncryptionService<T>,
    out: &mut dyn Write,
) -> Result<u8> {
    let batch = Batch::load(&args.file)?;
    if !service.is_enabled() {
        tracing::warn!("encryption is not configured; sensitive fields are written as plaintext");
    }

    let mut stored = Vec::with_capacity(batch.records.len());
    for (i, entity) in batch.records.iter().enumerate() {
        let record = service
            .to_storage(args.kind, entity)
            .await
            .with_context(|| format!("record {i} could not be encoded"))?;
        stored.push(record);
    }
    tracing::info!(kind = %args.kind, count = stored.len(), "records encoded");
    write_json(out, &batch.reshape(stored))?;
    Ok(0)
}

/// Storage records in, entity views out. Undecryptable fields show as
/// placeholders.
pub async fn run_decode<T: HsmTransport>(
    args: &RecordArgs,
    service: &EncryptionService<T>,
    out: &mut dyn Write,
) -> Result<u8> {
    let batch = Batch::load(&args.file)?;
    let mut views = Vec::with_capacity(batch.records.len());
    for record in &batch.records {
        views.push(service.from_storage(args.kind, record).await);
    }
    tracing::info!(kind = %args.kind, count = views.len(), "records decoded");
    write_json(out, &batch.reshape(views))?;
    Ok(0)
}

pub fn run_analytics(args: &RecordArgs, out: &mut dyn Write) -> Result<u8> {
    let batch = Batch::load(&args.file)?;
    write_json(out, &analytics(args.kind, &batch.records))?;
    Ok(0)
}

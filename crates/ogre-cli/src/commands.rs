use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use ogre_frame::{FrameCodec, FrameHeader};
use ogre_handler::TypeDictionary;
use ogre_reshard::{ReshardEngine, ReshardReport};
use ogre_storage::{ChannelStats, ChannelStorage, ConsolidationReport, StorageConfig};
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Reshard(args) => cmd_reshard(args, cli.format),
        Command::Scan(args) => cmd_scan(args, cli.format),
        Command::Inspect(args) => cmd_inspect(args, cli.format),
        Command::Consolidate(args) => cmd_consolidate(args, cli.format),
    }
}

fn load_config(path: &Path) -> anyhow::Result<StorageConfig> {
    StorageConfig::load(path).with_context(|| format!("loading store configuration {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---- reshard ----

fn cmd_reshard(args: ReshardArgs, format: OutputFormat) -> anyhow::Result<()> {
    let source = load_config(&args.source)?;
    let target = load_config(&args.target)?;
    let mut engine = ReshardEngine::from_configs(&source, &target).context("preparing reshard")?;
    if args.sequential {
        engine = engine.sequential();
    }
    let report = engine.run().context("resharding failed")?;
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            print_reshard_report(&report);
            Ok(())
        }
    }
}

fn print_reshard_report(report: &ReshardReport) {
    println!(
        "{} Resharded {} → {} channels",
        "✓".green().bold(),
        report.source_channels,
        report.target_channels
    );
    println!(
        "  Transferred: {} records, {} bytes",
        report.transferred.to_string().bold(),
        report.bytes_transferred
    );
    println!(
        "  Skipped: {} superseded, {} gaps",
        report.superseded, report.gaps_skipped
    );
    println!(
        "  Files: {} read, {} written",
        report.files_read, report.files_written
    );
    let dictionary = if report.dictionary_copied { "copied".green() } else { "none".dimmed() };
    println!("  Type dictionary: {dictionary}");
    for target in &report.targets {
        println!(
            "  {} {:>8} records {:>10} bytes {:>4} files",
            format!("channel {}", target.channel).cyan(),
            target.records,
            target.bytes,
            target.files
        );
    }
}

// ---- scan ----

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanEntry {
    Entity {
        offset: usize,
        length: u64,
        type_id: u64,
        oid: u64,
        payload: String,
    },
    Gap {
        offset: usize,
        length: u64,
    },
    Comment {
        offset: usize,
        length: u64,
        text: String,
    },
}

#[derive(Debug, Default, Serialize)]
pub struct ScanSummary {
    pub entities: usize,
    pub gaps: usize,
    pub gap_bytes: u64,
    pub entries: Vec<ScanEntry>,
    /// Set when the walk stopped at a corrupt frame.
    pub error: Option<String>,
}

/// Walk every frame of `bytes`, showing at most `dump` payload bytes per entity.
pub fn scan_buffer(codec: &FrameCodec, bytes: &[u8], dump: usize) -> ScanSummary {
    let mut summary = ScanSummary::default();
    for frame in codec.walk(bytes) {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                summary.error = Some(e.to_string());
                break;
            }
        };
        let entry = match frame.header {
            FrameHeader::Entity(header) => {
                summary.entities += 1;
                let start = frame.offset + ogre_frame::ENTITY_HEADER_LEN;
                let end = frame.offset + header.length as usize;
                let shown = &bytes[start..end.min(start + dump)];
                ScanEntry::Entity {
                    offset: frame.offset,
                    length: header.length,
                    type_id: header.type_id.value(),
                    oid: header.oid.value(),
                    payload: hex::encode(shown),
                }
            }
            FrameHeader::Gap { length } => {
                summary.gaps += 1;
                summary.gap_bytes += length;
                match codec.read_comment_at(bytes, frame.offset) {
                    Ok(Some(text)) => ScanEntry::Comment {
                        offset: frame.offset,
                        length,
                        text: text.to_string(),
                    },
                    _ => ScanEntry::Gap {
                        offset: frame.offset,
                        length,
                    },
                }
            }
        };
        summary.entries.push(entry);
    }
    summary
}

fn cmd_scan(args: ScanArgs, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let codec = FrameCodec::new(args.byte_order);
    let summary = scan_buffer(&codec, &bytes, args.dump);

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            for entry in &summary.entries {
                match entry {
                    ScanEntry::Entity { offset, length, type_id, oid, payload } => println!(
                        "{:>10}  {}  len={length} type={type_id} oid={} {}",
                        offset,
                        "entity ".green(),
                        oid.to_string().yellow(),
                        payload.dimmed()
                    ),
                    ScanEntry::Gap { offset, length } => {
                        println!("{:>10}  {}  len={length}", offset, "gap    ".blue())
                    }
                    ScanEntry::Comment { offset, length, text } => {
                        println!("{:>10}  {}  len={length} {text:?}", offset, "comment".magenta())
                    }
                }
            }
            println!(
                "\n{} entities, {} gaps ({} bytes)",
                summary.entities.to_string().bold(),
                summary.gaps,
                summary.gap_bytes
            );
        }
    }
    match summary.error {
        Some(error) => Err(anyhow::anyhow!(error).context(format!("{} is corrupt", args.file.display()))),
        None => Ok(()),
    }
}

// ---- inspect ----

#[derive(Debug, Serialize)]
pub struct StoreInspection {
    pub byte_order: String,
    pub channel_count: u32,
    pub entities: usize,
    pub highest_oid: Option<u64>,
    pub channels: Vec<ChannelStats>,
    pub types: Vec<TypeSummary>,
}

#[derive(Debug, Serialize)]
pub struct TypeSummary {
    pub type_id: u64,
    pub type_name: String,
    pub layout: String,
}

pub fn inspect_store(config: StorageConfig) -> anyhow::Result<StoreInspection> {
    let storage = ChannelStorage::open_config(config).context("opening store")?;
    let dictionary = match storage.load_type_dictionary()? {
        Some(text) => TypeDictionary::parse(&text).context("parsing type dictionary")?,
        None => TypeDictionary::new(),
    };
    Ok(StoreInspection {
        byte_order: storage.codec().order().to_string(),
        channel_count: storage.channel_count().get(),
        entities: storage.len(),
        highest_oid: storage.highest_oid().map(|oid| oid.value()),
        channels: storage.stats()?,
        types: dictionary
            .iter()
            .map(|d| TypeSummary {
                type_id: d.type_id.value(),
                type_name: d.type_name.clone(),
                layout: d.layout(),
            })
            .collect(),
    })
}

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let inspection = inspect_store(load_config(&args.config)?)?;
    if format == OutputFormat::Json {
        return print_json(&inspection);
    }

    println!(
        "Store: {} channels, {} byte order",
        inspection.channel_count.to_string().bold(),
        inspection.byte_order.cyan()
    );
    let highest = inspection
        .highest_oid
        .map(|oid| oid.to_string())
        .unwrap_or_else(|| "-".into());
    println!("Entities: {} (highest OID {})", inspection.entities.to_string().bold(), highest.yellow());
    for stats in &inspection.channels {
        println!(
            "  {} {:>8} entities {:>4} files {:>6} superseded {:>10} live bytes",
            format!("channel {}", stats.channel).cyan(),
            stats.entities,
            stats.files,
            stats.superseded,
            stats.live_bytes
        );
    }
    if inspection.types.is_empty() {
        println!("No type dictionary.");
    } else {
        println!("Types:");
        for ty in &inspection.types {
            println!("  {:>10} {} {}", ty.type_id, ty.type_name.bold(), ty.layout.dimmed());
        }
    }
    Ok(())
}

// ---- consolidate ----

pub fn consolidate_store(config: StorageConfig, channel: Option<u32>) -> anyhow::Result<Vec<ConsolidationReport>> {
    let storage = ChannelStorage::open_config(config).context("opening store")?;
    let reports = match channel {
        Some(channel) => {
            let channel = storage
                .channel_count()
                .index(channel)
                .with_context(|| format!("channel {channel}"))?;
            vec![storage.consolidate(channel)?]
        }
        None => storage.consolidate_all()?,
    };
    storage.sync()?;
    Ok(reports)
}

fn cmd_consolidate(args: ConsolidateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let reports = consolidate_store(load_config(&args.config)?, args.channel).context("consolidation failed")?;
    if format == OutputFormat::Json {
        return print_json(&reports);
    }
    let reclaimed: u64 = reports.iter().map(|r| r.reclaimed_bytes).sum();
    println!(
        "{} Consolidated {} channels, reclaimed {} bytes",
        "✓".green().bold(),
        reports.len(),
        reclaimed.to_string().bold()
    );
    for report in &reports {
        println!(
            "  {} {:>8} records {:>4} → {} files",
            format!("channel {}", report.channel).cyan(),
            report.records,
            report.files_removed,
            report.files_written
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogre_frame::{ByteOrder, FrameBuffer, FrameError};
    use ogre_types::{Oid, TypeId};

    #[test]
    fn scan_lists_entities_gaps_and_comments() {
        let codec = FrameCodec::new(ByteOrder::Little);
        let mut buffer = FrameBuffer::new(codec);
        buffer.push_entity(TypeId::new(1), Oid::new(5), &[0xAB; 16]).unwrap();
        buffer.push_gap(16).unwrap();
        buffer.push_entity(TypeId::new(1), Oid::new(6), &[0xCD; 8]).unwrap();
        buffer.push_comment("note").unwrap();

        let summary = scan_buffer(&codec, buffer.as_slice(), 4);
        assert_eq!(summary.entities, 2);
        assert_eq!(summary.gaps, 2);
        assert_eq!(summary.gap_bytes, 16 + 12);
        assert!(summary.error.is_none());
        assert_eq!(
            summary.entries[0],
            ScanEntry::Entity {
                offset: 0,
                length: 40,
                type_id: 1,
                oid: 5,
                payload: "abababab".into(),
            }
        );
        assert_eq!(summary.entries[1], ScanEntry::Gap { offset: 40, length: 16 });
        assert!(matches!(&summary.entries[3], ScanEntry::Comment { text, .. } if text == "note"));
    }

    #[test]
    fn scan_reports_corruption() {
        let codec = FrameCodec::new(ByteOrder::Little);
        let mut buffer = FrameBuffer::new(codec);
        buffer.push_entity(TypeId::new(1), Oid::new(5), b"x").unwrap();
        let mut bytes = buffer.as_slice().to_vec();
        bytes.extend_from_slice(&[0u8; 24]);

        let summary = scan_buffer(&codec, &bytes, 16);
        assert_eq!(summary.entities, 1);
        let expected = FrameError::ZeroLengthRecord { offset: 25 }.to_string();
        assert_eq!(summary.error, Some(expected));
    }

    #[test]
    fn inspect_reads_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::from_toml_str(&format!(
            "directory = {:?}\nchannel_count = 2\n",
            dir.path().display().to_string()
        ))
        .unwrap();
        {
            let storage = ChannelStorage::open_config(config.clone()).unwrap();
            let mut buffer = FrameBuffer::new(storage.codec());
            buffer.push_entity(TypeId::FIRST_CUSTOM, Oid::new(10), b"a").unwrap();
            buffer.push_entity(TypeId::FIRST_CUSTOM, Oid::new(11), b"b").unwrap();
            storage.write_records(&buffer).unwrap();
            storage
                .store_type_dictionary("1000000 app.Thing {\n\ti64 size,\n}\n")
                .unwrap();
            storage.sync().unwrap();
        }
        let inspection = inspect_store(config).unwrap();
        assert_eq!(inspection.channel_count, 2);
        assert_eq!(inspection.entities, 2);
        assert_eq!(inspection.highest_oid, Some(11));
        assert_eq!(inspection.types[0].type_name, "app.Thing");
        let json = serde_json::to_value(&inspection).unwrap();
        assert_eq!(json["channels"][1]["entities"], 1);
    }

    #[test]
    fn consolidate_rewrites_one_channel() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::from_toml_str(&format!(
            "directory = {:?}\nchannel_count = 2\n",
            dir.path().display().to_string()
        ))
        .unwrap();
        {
            let storage = ChannelStorage::open_config(config.clone()).unwrap();
            for payload in [b"v1", b"v2"] {
                let mut buffer = FrameBuffer::new(storage.codec());
                buffer.push_entity(TypeId::FIRST_CUSTOM, Oid::new(10), payload).unwrap();
                storage.write_records(&buffer).unwrap();
                storage.sync().unwrap();
            }
        }
        let reports = consolidate_store(config.clone(), Some(0)).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!((reports[0].files_removed, reports[0].files_written), (2, 1));
        assert!(consolidate_store(config.clone(), Some(2)).is_err());

        let storage = ChannelStorage::open_config(config).unwrap();
        assert_eq!(storage.stats().unwrap()[0].superseded, 0);
        assert_eq!(storage.read_entity(Oid::new(10)).unwrap().unwrap().payload(), b"v2");
    }
}

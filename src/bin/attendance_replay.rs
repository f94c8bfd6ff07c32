use anyhow::{bail, Context, Result};
use safepath_lib::{
    AppConfig, AttendanceReceipt, AttendanceRecord, AttendanceService, AttendanceServiceTrait,
    AttendanceType, ConnectionPool, ConnectivityMonitor, FileBlobStorage, FlushReport, GeoPoint,
    LocalNamespace, MemoryBlobStorage, QueueStatus, SqliteRemoteStore, StoredNotificationSink,
    StudentId,
};
use safepath_lib::{AttendanceDraft, BlobStorage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
struct CliOptions {
    input: PathBuf,
    output: Option<PathBuf>,
    pretty: bool,
    in_memory: bool,
    database_url: Option<String>,
    data_dir: Option<PathBuf>,
}

/// リプレイ入力の 1 ステップ
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ReplayStep {
    #[serde(rename_all = "camelCase")]
    Scan {
        student_id: StudentId,
        timestamp: i64,
        #[serde(default, rename = "type")]
        attendance_type: Option<AttendanceType>,
        #[serde(default)]
        gate: Option<String>,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lng: Option<f64>,
    },
    Online,
    Offline,
    Flush,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "step")]
enum StepResult {
    Scan { receipt: AttendanceReceipt },
    Connectivity { online: bool, flush: Option<FlushReport> },
    Flush { report: FlushReport },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayReport {
    steps: Vec<StepResult>,
    queue: QueueStatus,
    history: Vec<AttendanceRecord>,
}

fn usage() -> &'static str {
    "Usage: attendance_replay --input <path> [--output <path>] [--pretty] [--memory] [--database-url <url>] [--data-dir <path>]"
}

fn main() -> Result<()> {
    safepath_lib::init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_args(args)?;

    let raw = fs::read_to_string(&options.input)
        .with_context(|| format!("Failed to read {}", options.input.display()))?;
    let steps: Vec<ReplayStep> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse replay steps in {}", options.input.display()))?;

    let rt = Runtime::new().context("Failed to create Tokio runtime")?;
    let report = rt.block_on(replay(&options, steps))?;

    let payload = if options.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    emit_payload(options.output.as_deref(), &payload)
}

async fn replay(options: &CliOptions, steps: Vec<ReplayStep>) -> Result<ReplayReport> {
    let mut config = AppConfig::from_env();
    if let Some(dir) = &options.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(url) = &options.database_url {
        config.remote.database_url = url.clone();
    }
    config
        .validate()
        .map_err(|err| anyhow::anyhow!("Invalid configuration: {err}"))?;

    let (storage, pool): (Arc<dyn BlobStorage>, ConnectionPool) = if options.in_memory {
        let pool = ConnectionPool::from_memory()
            .await
            .context("Failed to open in-memory database")?;
        (Arc::new(MemoryBlobStorage::new()), pool)
    } else {
        let storage = FileBlobStorage::open(&config.storage.data_dir, config.storage.quota_bytes)
            .with_context(|| {
                format!(
                    "Failed to open local storage at {}",
                    config.storage.data_dir.display()
                )
            })?;
        let pool = ConnectionPool::new(&config.remote.database_url, config.remote.max_connections)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to database at {}",
                    config.remote.database_url
                )
            })?;
        (Arc::new(storage), pool)
    };

    let remote = Arc::new(
        SqliteRemoteStore::new(pool, config.remote.max_transaction_attempts)
            .with_poll_interval(Duration::from_millis(config.remote.live_poll_ms)),
    );
    remote
        .initialize()
        .await
        .context("Failed to run remote store migrations")?;

    let namespace = LocalNamespace::new(storage, config.storage.key_prefix.clone());
    let sink = Arc::new(StoredNotificationSink::new(
        namespace.clone(),
        config.analytics.max_notifications,
    ));
    let service = AttendanceService::new(
        namespace,
        remote,
        sink,
        ConnectivityMonitor::new(true),
        &config,
    );

    let mut students = BTreeSet::new();
    let mut results = Vec::with_capacity(steps.len());
    for step in steps {
        let result = match step {
            ReplayStep::Scan {
                student_id,
                timestamp,
                attendance_type,
                gate,
                lat,
                lng,
            } => {
                students.insert(student_id.clone());
                let location = GeoPoint::from_parts(lat, lng);
                let gate = gate.unwrap_or_else(|| "main".to_string());
                let receipt = match attendance_type {
                    Some(attendance_type) => {
                        let mut draft =
                            AttendanceDraft::new(student_id, attendance_type, timestamp)
                                .with_gate(gate);
                        draft.location = location;
                        service
                            .produce(draft)
                            .await
                            .map(|produced| produced.receipt)
                            .unwrap_or_else(|_| AttendanceReceipt::failed())
                    }
                    None => {
                        service
                            .record_gate_crossing(&student_id, &gate, timestamp, location)
                            .await
                    }
                };
                StepResult::Scan { receipt }
            }
            ReplayStep::Online => StepResult::Connectivity {
                online: true,
                flush: service.handle_connectivity(true).await?,
            },
            ReplayStep::Offline => StepResult::Connectivity {
                online: false,
                flush: service.handle_connectivity(false).await?,
            },
            ReplayStep::Flush => StepResult::Flush {
                report: service.flush_now().await?,
            },
        };
        results.push(result);
    }

    let mut history = Vec::new();
    for student in &students {
        history.extend(service.history_for(student)?);
    }

    Ok(ReplayReport {
        steps: results,
        queue: service.queue_status()?,
        history,
    })
}

fn write_output(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

fn emit_payload(target: Option<&Path>, payload: &str) -> Result<()> {
    if let Some(path) = target {
        write_output(path, payload)?;
        println!("Replay report written to {}", path.display());
    } else {
        println!("{payload}");
    }
    Ok(())
}

fn parse_args<I>(args: I) -> Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut pretty = false;
    let mut in_memory = false;
    let mut database_url: Option<String> = None;
    let mut data_dir: Option<PathBuf> = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-i" | "--input" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--input requires a path\n{}", usage()))?;
                input = Some(PathBuf::from(path));
            }
            "-o" | "--output" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--output requires a path\n{}", usage()))?;
                output = Some(PathBuf::from(path));
            }
            "--pretty" => {
                pretty = true;
            }
            "--memory" => {
                in_memory = true;
            }
            "--database-url" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("--database-url requires a value\n{}", usage())
                })?;
                database_url = Some(value);
            }
            "--data-dir" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--data-dir requires a path\n{}", usage()))?;
                data_dir = Some(PathBuf::from(value));
            }
            "-h" | "--help" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => {
                bail!("Unknown argument: {other}\n{}", usage());
            }
        }
    }

    let Some(input) = input else {
        bail!("--input is required\n{}", usage());
    };

    Ok(CliOptions {
        input,
        output,
        pretty,
        in_memory,
        database_url,
        data_dir,
    })
}

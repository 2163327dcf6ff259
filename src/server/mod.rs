/// Line-protocol command server
mod protocol;

use protocol::{parse, Command};

use crate::domain::{assignments_from_selection, Report, ReportFilter};
use crate::errors::{ApiError, ApiResult};
use crate::repo::AccountDirectory;
use crate::services::CoordinationEngine;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Shared by every connection
pub struct CommandContext {
    pub engine: Arc<CoordinationEngine>,
    pub accounts: Arc<dyn AccountDirectory>,
}

/// One response line, and whether the session ends after it
#[derive(Debug, PartialEq)]
pub struct Reply {
    pub line: String,
    pub close: bool,
}

impl Reply {
    fn line(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            close: false,
        }
    }
}

/// Accept connections forever. At most `pool_size` sessions are served at
/// once; further connections wait for a free slot.
pub async fn serve(listener: TcpListener, ctx: Arc<CommandContext>, pool_size: usize) -> Result<()> {
    let pool = Arc::new(Semaphore::new(pool_size));
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let ctx = Arc::clone(&ctx);
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    let _permit = match pool.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    debug!(%peer, "Command session started");
                    if let Err(e) = handle_connection(stream, ctx).await {
                        warn!(%peer, "Command session ended with error: {:#}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Bind `addr` and serve commands on it
pub async fn run(addr: &str, ctx: Arc<CommandContext>, pool_size: usize) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind command server on {}", addr))?;
    info!("Command server listening on {}", addr);
    serve(listener, ctx, pool_size).await
}

/// Longest request line accepted, newline included
const MAX_LINE_BYTES: usize = 64 * 1024;

enum Request {
    Line(String),
    TooLong,
    Closed,
}

/// Read one request line. Bytes that are not UTF-8 are replaced rather
/// than rejected; an overlong line is drained up to its newline.
async fn read_request<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Request>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_LINE_BYTES as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(Request::Closed);
    }
    if buf.len() == MAX_LINE_BYTES && buf.last() != Some(&b'\n') {
        loop {
            buf.clear();
            let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
            if n == 0 || buf.last() == Some(&b'\n') {
                break;
            }
        }
        return Ok(Request::TooLong);
    }
    Ok(Request::Line(String::from_utf8_lossy(buf).into_owned()))
}

async fn handle_connection(stream: TcpStream, ctx: Arc<CommandContext>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let request = read_request(&mut reader, &mut buf)
            .await
            .context("Failed to read from socket")?;

        let reply = match request {
            Request::Closed => break,
            Request::TooLong => Reply::line(format!(
                "ERROR|INVALID_INPUT|request line exceeds {} bytes",
                MAX_LINE_BYTES
            )),
            Request::Line(line) => match parse(&line) {
                Ok(command) => execute(command, &ctx).await,
                Err(e) => Reply::line(e.reply()),
            },
        };

        writer
            .write_all(format!("{}\n", reply.line).as_bytes())
            .await
            .context("Failed to write response")?;
        if reply.close {
            break;
        }
    }

    writer.shutdown().await.ok();
    Ok(())
}

/// `ERROR|<CODE>|<message>` on a single line
fn error_line(e: &ApiError) -> String {
    format!("ERROR|{}|{}", e.code(), e.to_string().replace('\n', " "))
}

fn reports_line(reports: &[Report]) -> ApiResult<String> {
    serde_json::to_string(reports).map_err(|e| ApiError::Internal(e.to_string()))
}

/// Run one command against the engine
pub async fn execute(command: Command, ctx: &CommandContext) -> Reply {
    if command == Command::Exit {
        return Reply {
            line: "Goodbye!".to_string(),
            close: true,
        };
    }
    match run_command(command, ctx).await {
        Ok(line) => Reply::line(line),
        Err(e) => Reply::line(error_line(&e)),
    }
}

async fn run_command(command: Command, ctx: &CommandContext) -> ApiResult<String> {
    let engine = &ctx.engine;
    let line = match command {
        Command::Login {
            username,
            password,
            role,
        } => {
            let outcome = ctx.accounts.verify(&username, &password, &role).await?;
            info!(username = %username, outcome = outcome.as_str(), "Login attempt");
            outcome.as_str().to_string()
        }
        Command::AddReport(new) => {
            let report = engine.create_report(new).await?;
            format!("REPORT_ADDED|{}", report.id())
        }
        Command::GetReports => reports_line(&engine.list_reports(&ReportFilter::all()).await?)?,
        Command::UpdateReport { id, field, value } => {
            engine.update_field(id, &field, &value).await?;
            "REPORT_UPDATED".to_string()
        }
        Command::AssignDepartments { id, selected } => {
            engine
                .assign_departments(id, &assignments_from_selection(&selected))
                .await?;
            "DEPARTMENTS_ASSIGNED".to_string()
        }
        Command::UpdateStatus {
            id,
            department,
            status,
        } => {
            engine.update_department_status(id, department, status).await?;
            "STATUS_UPDATED".to_string()
        }
        Command::UpdateSubStatus {
            id,
            department,
            status,
        } => {
            engine
                .update_sub_department_status(id, department, status)
                .await?;
            "STATUS_UPDATED".to_string()
        }
        Command::AddLog { id, actor, text } => {
            engine.append_communication_log(id, &actor, &text).await?;
            "LOG_ADDED".to_string()
        }
        Command::AddResource { id, text } => {
            engine.append_resource_needed(id, &text).await?;
            "RESOURCE_ADDED".to_string()
        }
        Command::GetActive(department) => reports_line(&engine.active_reports(department).await?)?,
        Command::Priority(id) => {
            let (_, assessment) = engine.recompute_priority(id).await?;
            format!("PRIORITY|{}|{}", assessment.label, assessment.score)
        }
        Command::Exit => "Goodbye!".to_string(),
    };
    Ok(line)
}

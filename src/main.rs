//! Purpose: `platefile` CLI entry point for inspecting and driving a remote platefile index.
//! Role: Binary crate root; parses args, runs one index operation, emits JSON on stdout.
//! Invariants: Errors are emitted as JSON on stderr; exit code comes from `api::to_exit_code`.
//! Invariants: Every command opens exactly one `RemoteIndex` and drops it before exiting.
#![allow(clippy::result_large_err)]
use std::time::Duration;

use clap::{Args, Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use platefile::api::{
    Error, ErrorKind, IndexHeader, IndexRecord, RemoteIndex, RemoteIndexOptions, TileCoordinate,
    TileHeader, TileRegion, TransactionId, to_exit_code,
};

#[derive(Parser, Debug)]
#[command(
    name = "platefile",
    version,
    about = "Inspect and drive a remote platefile index",
    long_about = None,
    after_help = r#"EXAMPLES
  $ platefile pf://mosaic/earth.plate info
  $ platefile pf://index-host:5672/mosaic/earth.plate read 3 5 4 --transaction 12
  $ platefile pf://mosaic/earth.plate valid-tiles 4 --begin 1 --end 12 --min-matches 2
  $ platefile pf://mosaic/earth.plate txn begin --description "nightly mosaic""#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(help = "Platefile URL: pf://[<host>[:<port>]/]<routing_key>/<platefile_name>")]
    url: String,
    #[arg(long, help = "Bearer token sent to the index service")]
    token: Option<String>,
    #[arg(long, help = "Per-request timeout in milliseconds")]
    timeout_ms: Option<u64>,
    #[arg(long, help = "Queued index updates per batched flush (default: 10)")]
    batch_size: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Show the platefile header")]
    Info,
    #[command(about = "Create the platefile, then show its header")]
    Create {
        #[arg(long, default_value_t = 256)]
        tile_size: u32,
        #[arg(long, default_value = "png")]
        filetype: String,
        #[arg(long, default_value_t = 0)]
        pixel_format: i32,
        #[arg(long, default_value_t = 0)]
        channel_type: i32,
    },
    #[command(about = "Count populated pyramid levels")]
    Levels,
    #[command(about = "Show the read cursor transaction")]
    Cursor,
    #[command(about = "Read one tile's index record")]
    Read {
        #[command(flatten)]
        tile: TileArgs,
        #[arg(long, help = "Transaction to read at (default: the read cursor)")]
        transaction: Option<i32>,
        #[arg(long, help = "Require a record at exactly this transaction")]
        exact: bool,
    },
    #[command(about = "List every version of one tile within a transaction range")]
    History {
        #[command(flatten)]
        tile: TileArgs,
        #[arg(long)]
        begin: i32,
        #[arg(long)]
        end: i32,
    },
    #[command(about = "List tiles with enough valid versions in a transaction range")]
    ValidTiles {
        level: u32,
        #[arg(long, help = "Region min column (default: whole level)")]
        col: Option<u32>,
        #[arg(long, help = "Region min row (default: whole level)")]
        row: Option<u32>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        begin: i32,
        #[arg(long)]
        end: i32,
        #[arg(long, default_value_t = 1)]
        min_matches: u32,
    },
    #[command(arg_required_else_help = true, about = "Transaction control")]
    Txn {
        #[command(subcommand)]
        command: TxnCommand,
    },
}

#[derive(Args, Debug)]
struct TileArgs {
    col: u32,
    row: u32,
    level: u32,
}

impl TileArgs {
    fn coordinate(&self) -> TileCoordinate {
        TileCoordinate::new(self.col, self.row, self.level)
    }
}

#[derive(Subcommand, Debug)]
enum TxnCommand {
    #[command(about = "Open a transaction and print its id")]
    Begin {
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, help = "Ask the service for this exact id")]
        id: Option<i32>,
    },
    #[command(about = "Commit a transaction")]
    Commit {
        id: i32,
        #[arg(long, help = "Leave the read cursor where it is")]
        no_cursor_update: bool,
    },
    #[command(about = "Mark a transaction failed")]
    Fail { id: i32 },
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let code = if err.kind() == ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand {
                    2
                } else {
                    0
                };
                return Ok(code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Argument)
                    .with_message(err.to_string().trim().to_string())
                    .with_hint("Run `platefile --help` for usage."));
            }
        },
    };
    let output = dispatch(cli)?;
    println!("{output}");
    Ok(0)
}

fn options_from(cli: &Cli) -> RemoteIndexOptions {
    let mut options = RemoteIndexOptions::new();
    if let Some(token) = &cli.token {
        options = options.with_token(token.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(batch_size) = cli.batch_size {
        options = options.with_write_queue_threshold(batch_size);
    }
    options
}

fn dispatch(cli: Cli) -> Result<Value, Error> {
    let options = options_from(&cli);
    let mut index = match &cli.command {
        Command::Create {
            tile_size,
            filetype,
            pixel_format,
            channel_type,
        } => {
            let header = IndexHeader::new(*tile_size, filetype.clone())
                .with_pixel_format(*pixel_format)
                .with_channel_type(*channel_type);
            RemoteIndex::create_with_options(&cli.url, header, options)?
        }
        _ => RemoteIndex::open_with_options(&cli.url, options)?,
    };
    match cli.command {
        Command::Info | Command::Create { .. } => Ok(info_json(&index)),
        Command::Levels => Ok(json!({ "num_levels": index.num_levels()? })),
        Command::Cursor => Ok(json!({ "transaction_id": index.transaction_cursor()?.get() })),
        Command::Read {
            tile,
            transaction,
            exact,
        } => {
            let transaction = match transaction {
                Some(id) => TransactionId(id),
                None => index.transaction_cursor()?,
            };
            let record = index.read(tile.coordinate(), transaction, exact)?;
            Ok(json!({
                "tile": tile_json(tile.coordinate()),
                "transaction_id": transaction.get(),
                "record": record_json(&record),
            }))
        }
        Command::History { tile, begin, end } => {
            let versions =
                index.multi_read(tile.coordinate(), TransactionId(begin), TransactionId(end))?;
            let versions: Vec<Value> = versions
                .iter()
                .map(|(id, record)| {
                    json!({ "transaction_id": id.get(), "record": record_json(record) })
                })
                .collect();
            Ok(json!({ "tile": tile_json(tile.coordinate()), "versions": versions }))
        }
        Command::ValidTiles {
            level,
            col,
            row,
            width,
            height,
            begin,
            end,
            min_matches,
        } => {
            let full = TileRegion::full_level(level);
            let region = TileRegion::new(
                col.unwrap_or(full.col),
                row.unwrap_or(full.row),
                width.unwrap_or(full.width),
                height.unwrap_or(full.height),
            );
            let tiles = index.valid_tiles(
                level,
                region,
                TransactionId(begin),
                TransactionId(end),
                min_matches,
            )?;
            let tiles: Vec<Value> = tiles.iter().map(tile_header_json).collect();
            Ok(json!({ "tiles": tiles }))
        }
        Command::Txn {
            command: TxnCommand::Begin { description, id },
        } => {
            let id = index.transaction_request(&description, id.map(TransactionId))?;
            Ok(json!({ "transaction_id": id.get() }))
        }
        Command::Txn {
            command:
                TxnCommand::Commit {
                    id,
                    no_cursor_update,
                },
        } => {
            index.transaction_complete(TransactionId(id), !no_cursor_update)?;
            Ok(json!({ "transaction_id": id, "state": "committed" }))
        }
        Command::Txn {
            command: TxnCommand::Fail { id },
        } => {
            index.transaction_failed(TransactionId(id))?;
            Ok(json!({ "transaction_id": id, "state": "failed" }))
        }
    }
}

fn info_json(index: &RemoteIndex) -> Value {
    let header = index.index_header();
    json!({
        "address": index.address().to_string(),
        "name": index.platefile_name(),
        "short_name": index.short_platefile_name(),
        "platefile_id": header.platefile_id,
        "version": header.version,
        "tile_size": header.tile_size,
        "tile_filetype": header.tile_filetype,
        "pixel_format": header.pixel_format,
        "channel_type": header.channel_type,
    })
}

fn tile_json(coord: TileCoordinate) -> Value {
    json!({ "col": coord.col, "row": coord.row, "level": coord.level })
}

fn tile_header_json(header: &TileHeader) -> Value {
    json!({
        "col": header.col,
        "row": header.row,
        "level": header.level,
        "transaction_id": header.transaction_id.get(),
        "filetype": header.filetype,
    })
}

fn record_json(record: &IndexRecord) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

fn emit_error(err: &Error) {
    let mut inner = serde_json::Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert(
        "message".to_string(),
        json!(err.message().map(str::to_string).unwrap_or_else(|| err.to_string())),
    );
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(operation) = err.operation() {
        inner.insert("operation".to_string(), json!(operation));
    }
    if let Some(platefile_id) = err.platefile_id() {
        inner.insert("platefile_id".to_string(), json!(platefile_id));
    }
    if let Some(tile) = err.tile() {
        inner.insert("tile".to_string(), tile_json(tile));
    }
    if let Some(transaction) = err.transaction() {
        inner.insert("transaction_id".to_string(), json!(transaction.get()));
    }
    eprintln!("{}", json!({ "error": Value::Object(inner) }));
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

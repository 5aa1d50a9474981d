//! caurus: CLI front-end for the cronto-v3 server core.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use caurus_core::config::{self, AccountRecord, Config, ServiceConfig};
use caurus_core::crypto::{OsRandom, RandomSource};
use caurus_core::protocol::{complete_activation, CodePolicy, ServiceContext};
use caurus_core::types::{Cell, MessageRow, Style};

mod barcode;
mod svg;

#[derive(Parser)]
#[command(name = "caurus", version, about = "cronto-v3 barcode server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render barcodes
    Barcode {
        #[command(subcommand)]
        command: BarcodeCommands,
    },

    /// Server-side commands
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
}

#[derive(Subcommand)]
enum BarcodeCommands {
    /// Print a serialized barcode as a digit grid
    Print {
        /// Serialized barcode (urlsafe base64)
        barcode: String,
    },

    /// Render a serialized barcode as SVG on stdout
    Svg {
        /// Fill the canvas with a white background
        #[arg(long)]
        background: bool,

        /// Serialized barcode (urlsafe base64)
        barcode: String,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Create a fresh service configuration
    Init {
        /// Service ID (0-63)
        #[arg(default_value_t = 1)]
        id: u8,

        /// Path to the configuration file
        #[arg(long, default_value = "caurus.cfg")]
        config: PathBuf,
    },

    /// Enrol a new client device
    Activate {
        /// Account number (random when omitted)
        account: Option<u16>,

        /// Path to the configuration file
        #[arg(long, default_value = "caurus.cfg")]
        config: PathBuf,

        /// Path to a SVG viewer
        #[arg(long)]
        viewer: Option<String>,

        /// Accept confirmation codes with a nonstandard counter
        #[arg(long)]
        lenient: bool,
    },

    /// Authorize a transaction message
    Transaction {
        /// Account number
        account: u16,

        /// Message rows as KEY[:VALUE[:STYLE]]
        message: Vec<String>,

        /// Path to the configuration file
        #[arg(long, default_value = "caurus.cfg")]
        config: PathBuf,

        /// Path to a SVG viewer
        #[arg(long)]
        viewer: Option<String>,

        /// Emit the code and barcode as JSON instead of prose
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let status = match cli.command {
        Commands::Barcode { command } => match command {
            BarcodeCommands::Print { barcode } => cmd_barcode_print(&barcode),
            BarcodeCommands::Svg { background, barcode } => cmd_barcode_svg(background, &barcode),
        },
        Commands::Server { command } => match command {
            ServerCommands::Init { id, config } => cmd_server_init(id, &config),
            ServerCommands::Activate {
                account,
                config,
                viewer,
                lenient,
            } => cmd_server_activate(account, &config, viewer.as_deref(), lenient),
            ServerCommands::Transaction {
                account,
                message,
                config,
                viewer,
                json,
            } => cmd_server_transaction(account, &message, &config, viewer.as_deref(), json),
        },
    };
    ExitCode::from(status)
}

// ---------------------------------------------------------------------------
// barcode subcommands
// ---------------------------------------------------------------------------

fn cmd_barcode_print(encoded: &str) -> u8 {
    match barcode::deserialize_barcode(encoded) {
        Some(modules) => {
            print!("{}", barcode::format_grid(&modules));
            0
        }
        None => {
            eprintln!("Invalid barcode");
            1
        }
    }
}

fn cmd_barcode_svg(background: bool, encoded: &str) -> u8 {
    let svg = barcode::deserialize_barcode(encoded)
        .and_then(|modules| svg::to_svg(&modules, background));
    match svg {
        Some(svg) => {
            println!("{svg}");
            0
        }
        None => {
            eprintln!("Invalid barcode");
            1
        }
    }
}

// ---------------------------------------------------------------------------
// server subcommands
// ---------------------------------------------------------------------------

fn cmd_server_init(id: u8, path: &Path) -> u8 {
    if id >= 64 {
        eprintln!("Invalid service ID {id}");
        return 1;
    }
    if path.exists() {
        eprintln!("Refusing to overwrite {}", path.display());
        return 1;
    }

    let mut rng = OsRandom;
    let mut mac = [0u8; 16];
    let mut key = [0u8; 16];
    rng.fill(&mut mac);
    rng.fill(&mut key);

    let config = Config {
        service: ServiceConfig { id, mac, key },
        accounts: Default::default(),
    };
    if let Err(err) = config::save_config(path, &config) {
        eprintln!("{err}");
        return 1;
    }
    println!("Ready!");
    0
}

fn cmd_server_activate(
    account: Option<u16>,
    path: &Path,
    viewer: Option<&str>,
    lenient: bool,
) -> u8 {
    let config = match config::load_config(path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    let mut ctx = context_from(&config.service);

    let started = match ctx.start_activation(account) {
        Ok(started) => started,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    if let Err(err) = view_barcode(&started.modules, viewer) {
        eprintln!("{err}");
        return 1;
    }
    if input_code(7).as_deref() != Some(started.code.as_str()) {
        eprintln!("Invalid code");
        return 1;
    }

    let continued = match ctx.continue_activation(started.account, &started.id, &started.key) {
        Ok(continued) => continued,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    if let Err(err) = view_barcode(&continued.modules, viewer) {
        eprintln!("{err}");
        return 1;
    }
    let Some(code) = input_code(7) else {
        return 1;
    };

    let policy = if lenient {
        CodePolicy::Lenient
    } else {
        CodePolicy::Strict
    };
    let Some(salt) = complete_activation(&started.key, &continued.state, &code, policy) else {
        eprintln!("Invalid code");
        return 1;
    };

    println!();
    println!("Client successfully confirmed! To use your account, add the following to your configuration file:");
    println!();
    let record = AccountRecord {
        id: started.id,
        key: started.key,
        salt,
    };
    print!("{}", config::serialize_account(started.account, &record));
    0
}

fn cmd_server_transaction(
    account: u16,
    message: &[String],
    path: &Path,
    viewer: Option<&str>,
    json: bool,
) -> u8 {
    let config = match config::load_config(path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    let Some(record) = config.accounts.get(&account) else {
        eprintln!("Invalid account");
        return 1;
    };

    let rows: Vec<MessageRow> = message.iter().map(|arg| parse_message_arg(arg)).collect();
    let mut ctx = context_from(&config.service);
    let result = match ctx.transaction(account, &record.key, &record.salt, &rows) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    if json {
        let out = serde_json::json!({
            "account": account,
            "code": result.code,
            "barcode": barcode::serialize_barcode(&result.modules),
        });
        println!("{out}");
        return 0;
    }

    if let Err(err) = view_barcode(&result.modules, viewer) {
        eprintln!("{err}");
        return 1;
    }
    println!("Code: {}", result.code);
    0
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn context_from(service: &ServiceConfig) -> ServiceContext<OsRandom> {
    ServiceContext::new(service.id, service.mac, service.key, OsRandom)
}

/// Parse one message argument of the form `KEY[:VALUE[:STYLE]]` into a row.
/// A trailing single-letter style applies to both cells of the row; any
/// other trailing segment stays part of the value.
fn parse_message_arg(arg: &str) -> MessageRow {
    let (key, rest) = match arg.split_once(':') {
        None => (arg, None),
        Some((key, rest)) => (key, Some(rest)),
    };

    let (value, style) = match rest {
        None => ("", None),
        Some(rest) => match rest.rsplit_once(':') {
            Some((value, letter)) => {
                let style = single_style_letter(letter);
                if style.is_some() {
                    (value, style)
                } else {
                    (rest, None)
                }
            }
            None => (rest, None),
        },
    };

    let cell = |text: &str| match style {
        Some(style) => Cell::styled(text, style),
        None => Cell::plain(text),
    };
    if value.is_empty() {
        vec![cell(key)]
    } else {
        vec![cell(key), cell(value)]
    }
}

fn single_style_letter(segment: &str) -> Option<Style> {
    let mut chars = segment.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Style::from_letter(letter)
}

/// Show a barcode: spawn the viewer on a temporary SVG when configured,
/// otherwise print the serialized form.
fn view_barcode(modules: &[u8], viewer: Option<&str>) -> io::Result<()> {
    let Some(viewer) = viewer else {
        println!("Barcode: {}", barcode::serialize_barcode(modules));
        return Ok(());
    };

    let svg = svg::to_svg(modules, true)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "barcode is not square"))?;
    let mut file = tempfile::Builder::new()
        .prefix("caurus-")
        .suffix(".svg")
        .tempfile()?;
    file.write_all(svg.as_bytes())?;
    std::process::Command::new(viewer).arg(file.path()).status()?;

    println!("Press enter to continue after you scanned the barcode...");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

/// Prompt for a numeric code of the given length. Empty input gives up.
fn input_code(length: usize) -> Option<String> {
    let stdin = io::stdin();
    loop {
        print!("Code: ");
        io::stdout().flush().ok();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return None, // EOF
            Ok(_) => {}
        }
        let code = line.trim();
        if code.is_empty() {
            return None;
        }
        if code.len() == length && code.chars().all(|c| c.is_ascii_digit()) {
            return Some(code.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_key_only() {
        assert_eq!(parse_message_arg("PAY"), vec![Cell::plain("PAY")]);
    }

    #[test]
    fn test_parse_message_key_value() {
        assert_eq!(
            parse_message_arg("TO:ALICE"),
            vec![Cell::plain("TO"), Cell::plain("ALICE")]
        );
    }

    #[test]
    fn test_parse_message_styled() {
        assert_eq!(
            parse_message_arg("AMOUNT:10 EUR:R"),
            vec![
                Cell::styled("AMOUNT", Style::Red),
                Cell::styled("10 EUR", Style::Red)
            ]
        );
    }

    #[test]
    fn test_parse_message_colon_in_value() {
        // trailing segment is not a style letter: it stays in the value
        assert_eq!(
            parse_message_arg("TIME:12:30"),
            vec![Cell::plain("TIME"), Cell::plain("12:30")]
        );
    }

    #[test]
    fn test_parse_message_styled_key_only() {
        assert_eq!(
            parse_message_arg("WARNING::R"),
            vec![Cell::styled("WARNING", Style::Red)]
        );
    }
}

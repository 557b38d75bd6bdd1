use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use safe_sdk::{Address, Amount, DEFAULT_OPERATION_TAG, Transaction, request_id};
use safe_transfer_lib::config::CONFIG_FILE;
use safe_transfer_lib::{AppConfig, AppError, Result, TransferRequest, TransferService};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "safe-transfer", version, about = "Build and submit multisig UTXO transfers")]
struct Cli {
    /// JSON config file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Spend own outputs of an asset to a destination
    Transfer {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        amount: Amount,
        /// MIX address; defaults to the configured group
        #[arg(long)]
        to: Option<Address>,
        #[arg(long)]
        memo: Option<String>,
        /// Fixed transaction hint
        #[arg(long)]
        hint: Option<Uuid>,
    },
    /// Derive the submission request id for an output
    RequestId {
        #[arg(long)]
        output_id: String,
        #[arg(long, default_value = DEFAULT_OPERATION_TAG)]
        tag: String,
    },
    /// Encode or inspect MIX addresses
    Address {
        #[command(subcommand)]
        action: AddressCommand,
    },
    /// Decode a raw transaction from hex
    DecodeTx { raw: String },
}

#[derive(Subcommand)]
enum AddressCommand {
    Encode {
        #[arg(long = "member", required = true)]
        members: Vec<String>,
        #[arg(long)]
        threshold: u8,
    },
    Decode { address: String },
}

#[derive(Serialize)]
struct AddressInfo {
    address: String,
    threshold: u8,
    members: Vec<String>,
    opaque: bool,
}

impl From<&Address> for AddressInfo {
    fn from(address: &Address) -> Self {
        Self {
            address: address.to_string(),
            threshold: address.threshold(),
            members: address.members(),
            opaque: !address.requires_masking(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Input(format!("rendering output: {e}")))?;
    println!("{json}");
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Transfer {
            asset,
            amount,
            to,
            memo,
            hint,
        } => {
            let config = AppConfig::load(&cli.config)?;
            let client = config.api_client()?;
            let service = TransferService::from_config(client, &config)?;
            let outcome = service
                .transfer(TransferRequest {
                    asset_id: asset,
                    amount,
                    destination: to,
                    memo,
                    hint,
                })
                .await?;
            print_json(&outcome)
        }
        Command::RequestId { output_id, tag } => {
            println!("{}", request_id(&output_id, &tag));
            Ok(())
        }
        Command::Address { action } => {
            let address = match action {
                AddressCommand::Encode { members, threshold } => {
                    Address::from_member_ids(&members, threshold)?
                }
                AddressCommand::Decode { address } => address.parse::<Address>()?,
            };
            print_json(&AddressInfo::from(&address))
        }
        Command::DecodeTx { raw } => {
            let transaction = Transaction::from_hex(&raw)?;
            print_json(&transaction)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    safe_transfer_lib::init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            if e.is_retryable() {
                log::info!("the failure is transient; the same command can be retried");
            }
            ExitCode::FAILURE
        }
    }
}

//! `sigil anchor`: Submit an anchoring operation by hand.

use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};

use crate::client::NodeClient;

#[derive(Args, Debug)]
pub struct AnchorArgs {
    #[command(subcommand)]
    pub command: AnchorCommand,
}

#[derive(Subcommand, Debug)]
pub enum AnchorCommand {
    /// Submit a pending operation to the ledger.
    Submit {
        /// Operation id.
        operation_id: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    operation_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerReceipt {
    transaction_id: String,
    block_height: u64,
}

pub async fn run(client: &NodeClient, args: &AnchorArgs) -> anyhow::Result<()> {
    match &args.command {
        AnchorCommand::Submit { operation_id } => {
            let receipt: LedgerReceipt = client
                .post(
                    "/functions/submit-ion-operation",
                    &SubmitRequest { operation_id },
                )
                .await?;
            println!("Operation anchored!");
            println!("  Transaction:  {}", receipt.transaction_id);
            println!("  Block height: {}", receipt.block_height);
            Ok(())
        }
    }
}

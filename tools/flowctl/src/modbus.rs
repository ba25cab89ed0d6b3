//! Modbus frame decoding and register map serving

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use parking_lot::Mutex;
use pointflow_modbus::{
    serve_until, FrameMode, Prefix, RegisterMapConfig, RequestFrame, RequestProcessor,
    ResponseFrame, SharedBank,
};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Subcommand)]
pub enum ModbusCommands {
    /// Decode one frame given as hex
    #[command(about = "Decode a Modbus TCP or RTU frame")]
    Decode {
        /// Frame bytes as hex, separators allowed ("01 03 00 00 00 02 C4 0B")
        hex: String,
        /// Frame uses RTU framing (unit id + PDU + CRC)
        #[arg(long)]
        rtu: bool,
        /// Frame is a server response
        #[arg(long)]
        response: bool,
    },

    /// Serve a register map over Modbus TCP
    #[command(about = "Serve a register map over Modbus TCP until interrupted")]
    Serve {
        /// Register map (YAML)
        #[arg(short, long)]
        config: PathBuf,
        /// Listen address
        #[arg(short, long, default_value = "0.0.0.0:502")]
        bind: String,
    },
}

pub async fn handle_command(cmd: ModbusCommands) -> Result<()> {
    match cmd {
        ModbusCommands::Decode { hex, rtu, response } => {
            let bytes = common::hex::decode(&hex)?;
            let mode = if rtu { FrameMode::Rtu } else { FrameMode::Tcp };
            println!(
                "{} {:?} frame: {}",
                "Decoding".bright_cyan(),
                mode,
                common::hex::encode_spaced(&bytes)
            );
            for line in describe(&bytes, mode, response)? {
                println!("  {}", line);
            }
            Ok(())
        },
        ModbusCommands::Serve { config, bind } => {
            let map = RegisterMapConfig::load(&config)
                .with_context(|| format!("Failed to read {}", config.display()))?;
            let bank = map
                .build_bank()
                .with_context(|| format!("Invalid register map {}", config.display()))?;
            println!(
                "{} {} registers, unit {}, word order {}",
                "Register map".bright_cyan(),
                bank.len(),
                map.unit_id,
                bank.word_order()
            );

            info!("Register map {} loaded", config.display());
            let bank: SharedBank = Arc::new(Mutex::new(bank));
            let listener = TcpListener::bind(&bind)
                .await
                .with_context(|| format!("Failed to bind {}", bind))?;
            println!("{} {}", "Listening on".green(), bind);

            let processor = RequestProcessor::new(map.unit_id);
            let stop = async {
                let signal = common::stop_signal().await;
                println!("{} ({})", "Stopping".yellow(), signal);
            };
            serve_until(listener, bank, processor, stop)
                .await
                .context("Modbus server stopped")?;
            Ok(())
        },
    }
}

/// Human readable lines for one complete frame
fn describe(bytes: &[u8], mode: FrameMode, response: bool) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    if response {
        let frame = ResponseFrame::decode(mode, bytes).context("Malformed response frame")?;
        lines.push(describe_prefix(&frame.prefix));
        lines.push(format!(
            "FC={:02X} {}",
            frame.response.function_code(),
            if frame.response.is_exception() {
                "exception response"
            } else {
                "response"
            }
        ));
        lines.push(format!("{:?}", frame.response));
    } else {
        let frame = RequestFrame::decode(mode, bytes).context("Malformed request frame")?;
        lines.push(describe_prefix(&frame.prefix));
        lines.push(format!("FC={:02X} request", frame.request.function_code()));
        lines.push(format!("{:?}", frame.request));
        if let Some(code) = frame.exception {
            lines.push(format!("would be answered with exception: {}", code));
        }
    }
    Ok(lines)
}

fn describe_prefix(prefix: &Prefix) -> String {
    match prefix.transaction_id() {
        Some(transaction_id) => format!(
            "trans_id={:04X}, unit_id={}",
            transaction_id,
            prefix.unit_id()
        ),
        None => format!("unit_id={}", prefix.unit_id()),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_describe_tcp_request() {
        let bytes = common::hex::decode("00 01 00 00 00 06 11 03 00 6B 00 03").unwrap();
        let lines = describe(&bytes, FrameMode::Tcp, false).unwrap();
        assert_eq!(lines[0], "trans_id=0001, unit_id=17");
        assert_eq!(lines[1], "FC=03 request");
        assert!(lines[2].contains("ReadHoldingRegisters"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_describe_rtu_and_flagged_request() {
        let bytes = common::hex::decode("01 03 08 2B 00 02 B6 63").unwrap();
        let lines = describe(&bytes, FrameMode::Rtu, false).unwrap();
        assert_eq!(lines[0], "unit_id=1");

        let bytes = common::hex::decode("00 02 00 00 00 06 01 05 00 00 12 34").unwrap();
        let lines = describe(&bytes, FrameMode::Tcp, false).unwrap();
        assert!(lines[3].starts_with("would be answered with exception"));
    }

    #[test]
    fn test_describe_response_and_errors() {
        let bytes = common::hex::decode("00 07 00 00 00 03 01 83 02").unwrap();
        let lines = describe(&bytes, FrameMode::Tcp, true).unwrap();
        assert_eq!(lines[1], "FC=03 exception response");

        let truncated = common::hex::decode("00 07 00 00 00 06 01 03").unwrap();
        assert!(describe(&truncated, FrameMode::Tcp, false).is_err());
    }
}

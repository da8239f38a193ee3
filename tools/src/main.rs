//! desk-runner: hosts the credit analyst dashboard.
//!
//! Usage:
//!   desk-runner --data-dir ./data --customer 100001 --predict --explain \
//!               --compare age,income_type --out page.html
//!   desk-runner --data-dir ./data --ipc-mode

use anyhow::Result;
use creditdesk_core::{
    command::DashboardCommand,
    comparison::ComparisonAttribute,
    config::DeskConfig,
    dashboard::{AppContext, Dashboard, PageView, SectionView},
    types::CustomerId,
};
use std::env;
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

#[derive(serde::Serialize)]
#[serde(untagged)]
enum IpcResponse<'a> {
    Page { page: &'a PageView },
    Error { error: String },
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    let config = DeskConfig::load(data_dir)?;
    let ctx = AppContext::load_with_http(config)?;
    let mut dashboard = Dashboard::new(ctx);

    if ipc_mode {
        run_ipc_loop(&mut dashboard)
    } else {
        render_once(&mut dashboard, &args, data_dir)
    }
}

/// Build the view state from flags and write one standalone page.
fn render_once(dashboard: &mut Dashboard, args: &[String], data_dir: &str) -> Result<()> {
    let out = args
        .windows(2)
        .find(|w| w[0] == "--out")
        .map(|w| w[1].as_str())
        .unwrap_or("dashboard.html");

    let mut commands = Vec::new();
    let default_id = dashboard.state().customer_id;
    let customer_id = parse_arg::<CustomerId>(args, "--customer", default_id)?;
    commands.push(DashboardCommand::SelectCustomer { customer_id });
    commands.push(DashboardCommand::SetPrediction {
        enabled: args.iter().any(|a| a == "--predict"),
    });
    commands.push(DashboardCommand::SetExplanation {
        enabled: args.iter().any(|a| a == "--explain"),
    });
    if let Some(list) = args.windows(2).find(|w| w[0] == "--compare") {
        commands.push(DashboardCommand::SetComparison {
            enabled: true,
            attributes: parse_attributes(&list[1])?,
        });
    }
    for cmd in commands {
        dashboard.apply(cmd)?;
    }

    let page = dashboard.render()?;
    std::fs::write(out, page.to_html()).map_err(|e| anyhow::anyhow!("Cannot write {out}: {e}"))?;

    println!("Credit Desk: desk-runner");
    println!("  data_dir:    {data_dir}");
    println!("  customer:    {customer_id}");
    println!("  prediction:  {}", section_status(&page.prediction));
    println!("  explanation: {}", section_status(&page.explanation));
    println!("  comparison:  {}", section_status(&page.comparison));
    println!("  written to:  {out}");
    Ok(())
}

fn run_ipc_loop(dashboard: &mut Dashboard) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: DashboardCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_response(&mut stdout, &IpcResponse::Error { error: e.to_string() })?;
                continue;
            }
        };
        if cmd == DashboardCommand::Quit {
            break;
        }

        if let Err(e) = dashboard.apply(cmd) {
            log::warn!("command rejected: {e}");
            write_response(&mut stdout, &IpcResponse::Error { error: e.to_string() })?;
            continue;
        }
        match dashboard.render() {
            Ok(page) => write_response(&mut stdout, &IpcResponse::Page { page: &page })?,
            Err(e) => write_response(&mut stdout, &IpcResponse::Error { error: e.to_string() })?,
        }
    }
    Ok(())
}

fn write_response(stdout: &mut io::Stdout, response: &IpcResponse<'_>) -> Result<()> {
    writeln!(stdout, "{}", serde_json::to_string(response)?)?;
    stdout.flush()?;
    Ok(())
}

fn section_status(section: &SectionView) -> String {
    match section {
        SectionView::Hidden => "hidden".into(),
        SectionView::Ready { .. } => "ready".into(),
        SectionView::Partial { message, .. } => format!("partial ({message})"),
        SectionView::Failed { message } => format!("failed ({message})"),
    }
}

/// Comma-separated keys or labels, e.g. `age,income_type` or `ÂGE,STATUT`.
fn parse_attributes(list: &str) -> Result<Vec<ComparisonAttribute>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<ComparisonAttribute>().map_err(anyhow::Error::msg))
        .collect()
}

/// Value following `flag`, or `default` when the flag is absent.
fn parse_arg<T>(args: &[String], flag: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(default);
    };
    let raw = args
        .get(pos + 1)
        .ok_or_else(|| anyhow::anyhow!("{flag} needs a value"))?;
    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid value '{raw}' for {flag}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn customer_flag_overrides_default() {
        let a = args(&["desk-runner", "--customer", "100003", "--predict"]);
        assert_eq!(parse_arg::<CustomerId>(&a, "--customer", 1).unwrap(), 100003);
    }

    #[test]
    fn absent_flag_keeps_default() {
        let a = args(&["desk-runner", "--predict"]);
        assert_eq!(parse_arg::<CustomerId>(&a, "--customer", 100001).unwrap(), 100001);
    }

    #[test]
    fn unparsable_value_is_an_error() {
        let a = args(&["desk-runner", "--customer", "abc"]);
        let err = parse_arg::<CustomerId>(&a, "--customer", 100001).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("--customer"), "{message}");
        assert!(message.contains("abc"), "{message}");
    }

    #[test]
    fn trailing_flag_without_value_is_an_error() {
        let a = args(&["desk-runner", "--customer"]);
        assert!(parse_arg::<CustomerId>(&a, "--customer", 100001).is_err());
    }

    #[test]
    fn attribute_list_accepts_keys_and_labels() {
        let parsed = parse_attributes("age, ÂGE,income_type,").unwrap();
        assert_eq!(
            parsed,
            vec![
                ComparisonAttribute::Age,
                ComparisonAttribute::Age,
                ComparisonAttribute::IncomeType
            ]
        );
        assert!(parse_attributes("salary").is_err());
    }
}

use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // SFP_WEBHOOK_SECRET is deliberately absent
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "SFP_HOST",
        "SFP_PORT",
        "SFP_DATABASE_URL",
        "SFP_OPERATOR_EMAIL",
        "SFP_WEBHOOK_SIGNATURE_HEADER",
        "SFP_WEBHOOK_TOLERANCE_SECS",
        "SFP_WEBHOOK_BUDGET_MS",
        "SFP_PROVIDER_IP_WHITELIST",
        "SFP_USE_X_FORWARDED_FOR",
        "SFP_USE_FORWARDED",
        "SFP_NOTIFICATION_TIMEOUT_MS",
        "SFP_EVENT_BUFFER_SIZE",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}

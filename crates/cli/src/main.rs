//! MedTrack CLI - command-line client for the MedTrack REST API

mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::ApiClient;
use colored::Colorize;
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_URL: &str = "http://127.0.0.1:8000";

#[derive(Parser)]
#[command(name = "medtrack-cli")]
#[command(about = "MedTrack adherence backend CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URL
    #[arg(long, env = "MEDTRACK_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Access token from `login`
    #[arg(long, env = "MEDTRACK_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server is up
    Health,

    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },

    /// Log in and print an access token
    Login {
        /// Username or email
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Show the current profile
    Profile,

    /// Manage medications
    #[command(subcommand)]
    Meds(MedCommands),

    /// Record a dose response
    Dose {
        medication: i64,
        /// taken, skipped or snoozed
        status: String,
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// List dose history
    Doses {
        #[arg(short, long)]
        medication: Option<i64>,
    },

    /// Record a refill dated today
    Refill { medication: i64 },

    /// Record a side effect
    SideEffect {
        medication: i64,
        #[arg(short, long)]
        symptom: String,
        #[arg(long, default_value = "1")]
        severity: u32,
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Show adherence insights
    Insights,

    /// Register or remove a push token
    #[command(subcommand)]
    FcmToken(TokenCommands),
}

#[derive(Subcommand)]
enum MedCommands {
    /// List medications
    List,
    /// Add a medication
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        schedule: String,
        #[arg(long)]
        dose: String,
        #[arg(long)]
        start_quantity: Option<u32>,
        #[arg(long)]
        dose_quantity: Option<u32>,
        #[arg(long)]
        times_per_day: Option<u32>,
        /// YYYY-MM-DD, defaults to today on the server
        #[arg(long)]
        start_date: Option<String>,
    },
    /// Delete a medication
    Remove { id: i64 },
    /// Show the supply estimate
    RefillStatus { id: i64 },
}

#[derive(Subcommand)]
enum TokenCommands {
    Register { token: String },
    Unregister { token: String },
}

#[derive(Tabled)]
struct MedicationRow {
    id: i64,
    name: String,
    schedule: String,
    dose: String,
    supply: String,
    start_date: String,
}

impl MedicationRow {
    fn from_json(med: &Value) -> Self {
        let supply = match (
            med["start_quantity"].as_u64(),
            med["dose_quantity"].as_u64(),
            med["times_per_day"].as_u64(),
        ) {
            (Some(qty), Some(dose), Some(times)) => format!("{} ({} x {}/day)", qty, dose, times),
            _ => "-".to_string(),
        };
        Self {
            id: med["id"].as_i64().unwrap_or_default(),
            name: text(&med["name"]),
            schedule: text(&med["schedule"]),
            dose: text(&med["dose"]),
            supply,
            start_date: text(&med["start_date"]),
        }
    }
}

#[derive(Tabled)]
struct DoseRow {
    id: i64,
    medication: i64,
    datetime: String,
    status: String,
    reason: String,
}

fn text(value: &Value) -> String {
    value.as_str().unwrap_or("-").to_string()
}

fn success(message: &str) {
    println!("{}", format!("✓ {}", message).green().bold());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = ApiClient::new(&cli.url, cli.token.clone());

    match cli.command {
        Commands::Health => match api.get("/health").await {
            Ok(health) => {
                println!("  {} {}", "Server:".bold(), cli.url);
                println!("  {} {}", "Status:".bold(), "ONLINE".green());
                println!("  {} {}", "Version:".bold(), text(&health["version"]));
            }
            Err(e) => {
                println!("  {} {}", "Status:".bold(), "ERROR".red());
                println!("  {} {}", "Error:".bold(), e);
            }
        },

        Commands::Register {
            username,
            email,
            password,
        } => {
            let user = api
                .post(
                    "/api/users/register/",
                    json!({ "username": username, "email": email, "password": password }),
                )
                .await?;
            success(&format!("Registered {} (id {})", text(&user["username"]), user["id"]));
        }

        Commands::Login { username, password } => {
            let login = api
                .post(
                    "/api/users/login/",
                    json!({ "username": username, "password": password }),
                )
                .await?;
            success(&format!("Logged in as {}", text(&login["user"]["username"])));
            println!();
            println!("export MEDTRACK_TOKEN={}", text(&login["access"]));
        }

        Commands::Profile => {
            let user = api.get("/api/users/profile/").await?;
            println!("{}", "Profile".cyan().bold());
            for field in ["id", "username", "email", "dob", "chronic_conditions", "goals"] {
                let value = match &user[field] {
                    Value::String(s) => s.clone(),
                    Value::Null => "-".to_string(),
                    other => other.to_string(),
                };
                println!("  {} {}", format!("{}:", field).bold(), value);
            }
        }

        Commands::Meds(MedCommands::List) => {
            let meds = api.get("/api/medications/").await?;
            let rows: Vec<MedicationRow> = meds
                .as_array()
                .map(|meds| meds.iter().map(MedicationRow::from_json).collect())
                .unwrap_or_default();
            if rows.is_empty() {
                println!("{}", "No medications".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Meds(MedCommands::Add {
            name,
            schedule,
            dose,
            start_quantity,
            dose_quantity,
            times_per_day,
            start_date,
        }) => {
            let med = api
                .post(
                    "/api/medications/",
                    json!({
                        "name": name,
                        "schedule": schedule,
                        "dose": dose,
                        "start_quantity": start_quantity,
                        "dose_quantity": dose_quantity,
                        "times_per_day": times_per_day,
                        "start_date": start_date,
                    }),
                )
                .await?;
            success("Medication added");
            println!();
            println!("{}", Table::new(vec![MedicationRow::from_json(&med)]));
        }

        Commands::Meds(MedCommands::Remove { id }) => {
            api.delete(&format!("/api/medications/{}/", id), None).await?;
            success(&format!("Medication {} deleted", id));
        }

        Commands::Meds(MedCommands::RefillStatus { id }) => {
            let estimate = api
                .get(&format!("/api/medications/{}/refill-status/", id))
                .await?;
            if estimate.is_null() {
                println!(
                    "{}",
                    "Supply not tracked (set start_quantity, dose_quantity, times_per_day)"
                        .yellow()
                );
            } else {
                let days_left = estimate["days_left"].as_i64().unwrap_or_default();
                let label = format!("{} days left", days_left);
                let label = if estimate["needs_refill"].as_bool().unwrap_or(false) {
                    label.red().bold()
                } else {
                    label.green()
                };
                println!("  {} {}", "Supply:".bold(), label);
                println!(
                    "  {} {}",
                    "Runs out:".bold(),
                    text(&estimate["depletion_date"])
                );
            }
        }

        Commands::Dose {
            medication,
            status,
            reason,
        } => {
            let log = api
                .post(
                    "/api/reminders/reminder-response/",
                    json!({ "medication": medication, "status": status, "reason": reason }),
                )
                .await?;
            success(&format!("Dose {} at {}", text(&log["status"]), text(&log["datetime"])));
        }

        Commands::Doses { medication } => {
            let path = match medication {
                Some(id) => format!("/api/reminders/reminder-response/?medication={}", id),
                None => "/api/reminders/reminder-response/".to_string(),
            };
            let logs = api.get(&path).await?;
            let rows: Vec<DoseRow> = logs
                .as_array()
                .map(|logs| {
                    logs.iter()
                        .map(|log| DoseRow {
                            id: log["id"].as_i64().unwrap_or_default(),
                            medication: log["medication"].as_i64().unwrap_or_default(),
                            datetime: text(&log["datetime"]),
                            status: text(&log["status"]),
                            reason: text(&log["reason"]),
                        })
                        .collect()
                })
                .unwrap_or_default();
            if rows.is_empty() {
                println!("{}", "No doses logged".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Refill { medication } => {
            let log = api
                .post(
                    "/api/reminders/refill-log/",
                    json!({ "medication": medication }),
                )
                .await?;
            success(&format!("Refill logged on {}", text(&log["date"])));
        }

        Commands::SideEffect {
            medication,
            symptom,
            severity,
            notes,
        } => {
            api.post(
                "/api/sideeffects/side-effect-log/",
                json!({
                    "medication": medication,
                    "symptom": symptom,
                    "severity": severity,
                    "notes": notes,
                }),
            )
            .await?;
            success("Side effect logged");
        }

        Commands::Insights => {
            let insights = api.get("/api/insights/").await?;
            println!("{}", "Insights".cyan().bold());
            println!();
            println!(
                "  {} {:.1}%",
                "Adherence:".bold(),
                insights["adherence_score"].as_f64().unwrap_or_default()
            );
            println!(
                "  {} {}",
                "Current streak:".bold(),
                insights["current_streak"]
            );

            if let Some(trends) = insights["symptom_trends"].as_array() {
                println!();
                println!("  {}", "Symptoms (30 days):".bold());
                for trend in trends {
                    println!("    {} x{}", text(&trend["symptom"]), trend["count"]);
                }
            }
            if let Some(missed) = insights["missed_dose_breakdown"].as_array() {
                println!();
                println!("  {}", "Missed doses (30 days):".bold());
                for entry in missed {
                    let reason = entry["reason"].as_str().unwrap_or("(no reason)");
                    println!("    {} x{}", reason, entry["count"]);
                }
            }
        }

        Commands::FcmToken(TokenCommands::Register { token }) => {
            let reply = api
                .post("/api/users/fcm-token/", json!({ "token": token }))
                .await?;
            success(&text(&reply["detail"]));
        }

        Commands::FcmToken(TokenCommands::Unregister { token }) => {
            api.delete("/api/users/fcm-token/", Some(json!({ "token": token })))
                .await?;
            success("Token removed");
        }
    }

    Ok(())
}

//! Field Guardian CLI - Command-line shell around the validation engine
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to rule set and service operations
//! - Handles external concerns like file I/O, process exit codes, and terminal output
//! - Provides clean separation between user interface and validation logic

use clap::{Parser, Subcommand, ValueEnum};
use field_guardian::{
    created_response, GuardianError, GuardianResult, InMemoryUserRepository, OutputFormat,
    ReportFormatter, ReportOptions, RuleSet, RuleSetConfig, Severity, Submission, User,
    UserService, ValidationOptions,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Config file names looked up in the working directory
const DEFAULT_CONFIGS: [&str; 3] = [
    "field_guardian.yaml",
    "field_guardian.yml",
    ".field_guardian.yaml",
];

/// Field Guardian - Declarative field validation
#[derive(Parser)]
#[command(name = "field-guardian")]
#[command(version = "0.1.0")]
#[command(about = "Validate user records against declarative field rules")]
#[command(long_about = "Field Guardian runs an ordered set of field rules against user records and reports every failed check. Rules come from the built-in defaults or a YAML/JSON configuration file.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Rule configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one user or a file of users
    Check {
        /// Name of the user to validate
        #[arg(long, requires = "age", conflicts_with = "input")]
        name: Option<String>,

        /// Age of the user to validate
        #[arg(long, allow_hyphen_values = true)]
        age: Option<i32>,

        /// YAML or JSON file holding a user or a list of users
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Minimum severity level to report
        #[arg(short = 's', long, value_enum)]
        min_severity: Option<SeverityArg>,

        /// Maximum number of errors to report per user
        #[arg(long)]
        max_errors: Option<usize>,

        /// Disable parallel validation of user lists
        #[arg(long)]
        no_parallel: bool,
    },

    /// Run the sample walkthrough: an invalid user, then create/edit/delete
    Demo,

    /// List configured rules
    Rules {
        /// Show only rules for this field
        #[arg(long)]
        field: Option<String>,
    },

    /// Explain the checks applied to a field
    Explain {
        /// Field name to explain
        field: String,
    },

    /// Validate a rule configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq, Debug)]
enum OutputFormatArg {
    Human,
    Json,
    Fields,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Fields => OutputFormat::Fields,
        }
    }
}

#[derive(Copy, Clone, ValueEnum, Debug)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

/// Settings for the `check` command
struct CheckArgs {
    name: Option<String>,
    age: Option<i32>,
    input: Option<PathBuf>,
    format: OutputFormatArg,
    min_severity: Option<SeverityArg>,
    max_errors: Option<usize>,
    parallel: bool,
    use_colors: bool,
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run_command(cli) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

fn run_command(cli: Cli) -> GuardianResult<i32> {
    let use_colors = !cli.no_color;

    match cli.command {
        Commands::Check {
            name,
            age,
            input,
            format,
            min_severity,
            max_errors,
            no_parallel,
        } => run_check(
            cli.config,
            CheckArgs {
                name,
                age,
                input,
                format,
                min_severity,
                max_errors,
                parallel: !no_parallel,
                use_colors,
            },
        ),
        Commands::Demo => run_demo(cli.config, use_colors),
        Commands::Rules { field } => run_list_rules(cli.config, field),
        Commands::Explain { field } => run_explain(cli.config, &field),
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
    }
}

/// Load the explicit config, else the first default file found, else the built-in rules
fn load_config(config_path: Option<PathBuf>) -> GuardianResult<RuleSetConfig> {
    if let Some(path) = config_path {
        return RuleSetConfig::load_from_file(path);
    }

    for name in DEFAULT_CONFIGS {
        if Path::new(name).exists() {
            tracing::debug!("Using configuration from {name}");
            return RuleSetConfig::load_from_file(name);
        }
    }

    Ok(RuleSetConfig::default())
}

/// Parse a YAML/JSON document holding either one user or a list of users
fn load_users(path: &Path) -> GuardianResult<Vec<User>> {
    let contents = fs::read_to_string(path)?;

    if let Ok(users) = serde_yaml::from_str::<Vec<User>>(&contents) {
        return Ok(users);
    }

    serde_yaml::from_str::<User>(&contents)
        .map(|user| vec![user])
        .map_err(|e| {
            GuardianError::config(format!(
                "Failed to parse users from '{}': {}",
                path.display(),
                e
            ))
        })
}

fn run_check(config_path: Option<PathBuf>, args: CheckArgs) -> GuardianResult<i32> {
    let rules: RuleSet<User> = load_config(config_path)?.build()?;

    let users = match (args.input, args.name, args.age) {
        (Some(path), _, _) => load_users(&path)?,
        (None, Some(name), Some(age)) => vec![User::new(name, age)],
        _ => {
            return Err(GuardianError::config(
                "Provide either --name and --age, or --input <FILE>",
            ))
        }
    };

    let results = rules.validate_all(&users, &ValidationOptions { parallel: args.parallel })?;

    let formatter = ReportFormatter::new(ReportOptions {
        use_colors: args.use_colors,
        max_errors: args.max_errors,
        min_severity: args.min_severity.map(Into::into),
        ..Default::default()
    });
    let format: OutputFormat = args.format.into();

    if format == OutputFormat::Json {
        let mut entries = Vec::with_capacity(users.len());
        for (user, result) in users.iter().zip(&results) {
            let report: serde_json::Value =
                serde_json::from_str(&formatter.format_result(result, format)?)
                    .map_err(|e| GuardianError::serialization(e.to_string()))?;
            entries.push(serde_json::json!({ "user": user, "report": report }));
        }
        let output = serde_json::to_string_pretty(&entries)
            .map_err(|e| GuardianError::serialization(e.to_string()))?;
        println!("{output}");
    } else {
        let many = users.len() > 1;
        for (index, (user, result)) in users.iter().zip(&results).enumerate() {
            if many {
                println!("#{} {:?} (age {})", index + 1, user.name, user.age);
            }
            print!("{}", formatter.format_result(result, format)?);
        }
    }

    let invalid = results.iter().filter(|r| !r.is_valid()).count();
    tracing::debug!("Checked {} user(s), {} invalid", users.len(), invalid);

    Ok(if invalid > 0 { 1 } else { 0 })
}

fn run_demo(config_path: Option<PathBuf>, use_colors: bool) -> GuardianResult<i32> {
    let rules: RuleSet<User> = load_config(config_path)?.build()?;
    let rules = Arc::new(rules);
    let formatter = ReportFormatter::new(ReportOptions {
        use_colors,
        ..Default::default()
    });

    println!("==== Welcome to Field Guardian! ====");

    let user = User::new("", -5);
    let result = rules.validate(&user)?;
    print!("{}", formatter.format_result(&result, OutputFormat::Human)?);

    println!();
    println!("==== Managing users ====");
    let service = UserService::new(rules, InMemoryUserRepository::with_sample_data());
    print_users(&service.list());

    println!("Create {{ name: \"A\", age: 130 }}");
    report_submission(&formatter, service.create("A", 130)?)?;

    println!("Create {{ name: \"Lea Lang\", age: 41 }}");
    report_submission(&formatter, service.create("Lea Lang", 41)?)?;

    println!("Edit user 1 -> {{ name: \"Max Meier\", age: 26 }}");
    report_submission(&formatter, service.update(User::new("Max Meier", 26).with_id(1))?)?;

    println!("Delete user 2");
    match service.delete(2) {
        Some(user) => println!("User {} ({}) deleted successfully!", user.id, user.name),
        None => println!("User 2 not found"),
    }

    print_users(&service.list());
    Ok(0)
}

fn report_submission(formatter: &ReportFormatter, submission: Submission) -> GuardianResult<()> {
    match submission {
        Submission::Accepted(user) => {
            println!("{}", created_response(&user, "User saved successfully!")?);
        }
        Submission::Rejected(result) => {
            print!("{}", formatter.format_result(&result, OutputFormat::Fields)?);
        }
    }
    Ok(())
}

fn print_users(users: &[User]) {
    println!("Users:");
    for user in users {
        println!("  {:>3}  {:<20} {}", user.id, user.name, user.age);
    }
}

fn run_list_rules(config_path: Option<PathBuf>, field_filter: Option<String>) -> GuardianResult<i32> {
    let config = load_config(config_path)?;

    println!(
        "Rules for '{}' (cascade: {:?}, class level: {:?})\n",
        config.entity, config.cascade, config.class_level_cascade
    );

    for rule in &config.rules {
        if let Some(ref filter) = field_filter {
            if &rule.field != filter {
                continue;
            }
        }

        println!("{}", rule.field);
        for check in &rule.checks {
            let severity = check.severity.unwrap_or_default();
            let message = check
                .message
                .as_deref()
                .unwrap_or_else(|| check.predicate.default_message());
            println!("  {} [{}] - {}", check.predicate, severity.as_str(), message);
        }
        println!();
    }

    Ok(0)
}

fn run_explain(config_path: Option<PathBuf>, field: &str) -> GuardianResult<i32> {
    let rules: RuleSet<User> = load_config(config_path)?.build()?;
    let mut found = false;

    for rule in rules.rules_for(field) {
        found = true;
        let cascade = rule.cascade_mode().unwrap_or(rules.cascade());

        println!("Field: {} (shown as '{}')", rule.field_name(), rule.label());
        println!("Cascade: {cascade:?}");
        println!("Checks, in evaluation order:");
        for (index, check) in rule.checks().iter().enumerate() {
            println!(
                "  {}. {} [{}]",
                index + 1,
                check.predicate(),
                check.severity().as_str()
            );
            println!("     message: {}", check.message_template());
        }
    }

    if found {
        return Ok(0);
    }

    eprintln!("No rules for field '{field}'");
    let fields: Vec<&str> = rules.rules().iter().map(|r| r.field_name()).collect();
    println!("Fields with rules: {}", fields.join(", "));
    Ok(1)
}

fn run_validate_config(config_path: Option<PathBuf>) -> GuardianResult<i32> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIGS[0]));

    println!("Validating configuration: {}", config_path.display());

    let outcome =
        RuleSetConfig::load_from_file(&config_path).and_then(|config| {
            config.build::<User>()?;
            Ok(config)
        });

    match outcome {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  Entity: {}", config.entity);
            println!("  Rules: {}", config.rules.len());
            println!("  Checks: {}", config.check_count());
            Ok(0)
        }
        Err(e) => {
            eprintln!("Configuration validation failed: {e}");
            Ok(1)
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

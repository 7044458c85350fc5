//! CLI command definitions and argument parsing

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use serde_json::json;
use uhu_core::{
    Mode, ObjectInputs, OptionName, OptionValue, Package, SetValue, UhuError, DEFAULT_SECTION,
};

use crate::config::{CliOverrides, Settings};
use crate::output::{OutputFormat, OutputFormatter, SuccessMessage};
use crate::ExitCode;

/// UHU - firmware update package builder
#[derive(Parser, Debug)]
#[command(name = "uhu")]
#[command(version, about = "UHU - firmware update package builder")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Package file path
    #[arg(long, env = "UHU_PKG_FILE", default_value = ".uhu", global = true)]
    pub package: PathBuf,

    /// Config file path
    #[arg(long, env = "UHU_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Chunk size in bytes, overriding the configured value
    #[arg(long, env = "UHU_CHUNK_SIZE", global = true)]
    pub chunk_size: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

impl Cli {
    /// Overrides carried by global flags and environment variables
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            chunk_size: self.chunk_size.clone(),
            debug: self.debug,
            verbose: self.verbose,
        }
    }

    /// Execute the command and report any failure. Returns the exit status.
    pub fn run(self, settings: Settings) -> ExitCode {
        let formatter = OutputFormatter::new(self.output, self.verbose);
        match self.execute_with_settings(settings) {
            Ok(code) => code,
            Err(e) => {
                let code = ExitCode::for_error(&e);
                tracing::debug!(error = ?e, code = code.name(), "Command failed");
                let message = formatter.format_error_with_code(&format!("{e:#}"), code);
                match formatter.format() {
                    OutputFormat::Json => println!("{message}"),
                    OutputFormat::Table => eprintln!("{message}"),
                    OutputFormat::Quiet => {}
                }
                code
            }
        }
    }

    /// Execute the CLI command with resolved settings
    pub fn execute_with_settings(self, settings: Settings) -> anyhow::Result<ExitCode> {
        let mut ctx = Context {
            package_path: self.package,
            settings,
            formatter: OutputFormatter::new(self.output, self.verbose),
        };

        match self.command {
            Commands::Config(args) => args.execute(&mut ctx),
            Commands::Hardware(args) => args.execute(&ctx),
            Commands::Product(args) => args.execute(&ctx),
            Commands::Package(args) => args.execute(&ctx),
            Commands::Object(args) => args.execute(&ctx),
            Commands::Modes => {
                ctx.emit(ctx.formatter.format_modes());
                Ok(ExitCode::Success)
            }
        }
    }
}

/// State shared by every command of one invocation
pub struct Context {
    /// Package file the command reads and writes
    pub package_path: PathBuf,
    /// Effective configuration
    pub settings: Settings,
    /// Output formatter
    pub formatter: OutputFormatter,
}

impl Context {
    /// Load the package file; a missing file is an empty package.
    pub fn load_package(&self) -> Result<Package, UhuError> {
        if self.package_path.exists() {
            Package::from_file(&self.package_path)
        } else {
            tracing::debug!(path = %self.package_path.display(), "No package file, starting empty");
            Ok(Package::new())
        }
    }

    pub fn save_package(&self, package: &Package) -> Result<(), UhuError> {
        package.dump(&self.package_path)
    }

    fn emit(&self, text: String) {
        if !self.formatter.is_quiet() && !text.is_empty() {
            println!("{text}");
        }
    }

    fn done(&self, command: &str, message: String) -> anyhow::Result<ExitCode> {
        self.formatter.success(&message);
        self.emit(
            self.formatter
                .format_success(&SuccessMessage::new(message), command),
        );
        Ok(ExitCode::Success)
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the configuration store
    Config(ConfigArgs),
    /// Manage supported hardware
    Hardware(HardwareArgs),
    /// Manage the product
    Product(ProductArgs),
    /// Package-level operations
    Package(PackageArgs),
    /// Manage package objects
    Object(ObjectArgs),
    /// List installation modes, their target types and options
    Modes,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

impl ConfigArgs {
    pub fn execute(self, ctx: &mut Context) -> anyhow::Result<ExitCode> {
        match self.action {
            ConfigAction::Init => {
                let stdin = io::stdin();
                let mut input = stdin.lock();
                let access_id = prompt(&mut input, "Access id: ")?;
                let access_secret = prompt(&mut input, "Access secret: ")?;
                ctx.settings.store_mut().set_initial(&access_id, &access_secret)?;
                let path = ctx.settings.store_mut().path().display().to_string();
                ctx.done("config init", format!("Credentials saved to {path}"))
            }
            ConfigAction::Set {
                entry,
                value,
                section,
            } => {
                ctx.settings.store_mut().set(entry.as_str(), value, &section)?;
                ctx.done("config set", format!("{section}.{entry} updated"))
            }
            ConfigAction::Get { entry, section } => {
                let value = ctx.settings.store()?.require(&entry, &section)?;
                match ctx.formatter.format() {
                    OutputFormat::Table => println!("{value}"),
                    OutputFormat::Json => ctx.emit(ctx.formatter.format_success(
                        &json!({ "section": section, "entry": entry, "value": value }),
                        "config get",
                    )),
                    OutputFormat::Quiet => {}
                }
                Ok(ExitCode::Success)
            }
        }
    }
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Prompt for access credentials and store them
    Init,
    /// Set a configuration entry
    Set {
        /// Entry name
        entry: String,
        /// New value
        value: String,
        /// Section holding the entry
        #[arg(long, default_value = DEFAULT_SECTION)]
        section: String,
    },
    /// Print a configuration entry; an unset entry is a configuration error
    Get {
        /// Entry name
        entry: String,
        /// Section holding the entry
        #[arg(long, default_value = DEFAULT_SECTION)]
        section: String,
    },
}

/// Prompt on stderr and read one non-empty line.
fn prompt(input: &mut impl BufRead, label: &str) -> anyhow::Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let value = line.trim();
    if value.is_empty() {
        bail!("{} must not be empty", label.trim_end_matches([':', ' ']));
    }
    Ok(value.to_string())
}

/// Arguments for the hardware command
#[derive(Parser, Debug)]
pub struct HardwareArgs {
    #[command(subcommand)]
    pub action: HardwareAction,
}

impl HardwareArgs {
    pub fn execute(self, ctx: &Context) -> anyhow::Result<ExitCode> {
        let mut package = ctx.load_package()?;
        match self.action {
            HardwareAction::Add { id } => {
                if !package.supported_hardware_mut().add(id.as_str()) {
                    ctx.formatter
                        .warning(&format!("Hardware {id} is already supported"));
                }
                ctx.save_package(&package)?;
                ctx.done("hardware add", format!("Hardware {id} added"))
            }
            HardwareAction::Remove { id } => {
                package.supported_hardware_mut().remove(&id)?;
                ctx.save_package(&package)?;
                ctx.done("hardware remove", format!("Hardware {id} removed"))
            }
        }
    }
}

/// Hardware subcommands
#[derive(Subcommand, Debug)]
pub enum HardwareAction {
    /// Add a supported hardware identifier
    Add {
        /// Hardware identifier
        id: String,
    },
    /// Remove a supported hardware identifier
    Remove {
        /// Hardware identifier
        id: String,
    },
}

/// Arguments for the product command
#[derive(Parser, Debug)]
pub struct ProductArgs {
    #[command(subcommand)]
    pub action: ProductAction,
}

impl ProductArgs {
    pub fn execute(self, ctx: &Context) -> anyhow::Result<ExitCode> {
        match self.action {
            ProductAction::Use { uid } => {
                let mut package = ctx.load_package()?;
                package.set_product(uid.as_str());
                ctx.save_package(&package)?;
                ctx.done("product use", format!("Product set to {uid}"))
            }
        }
    }
}

/// Product subcommands
#[derive(Subcommand, Debug)]
pub enum ProductAction {
    /// Set the product UID of the package
    Use {
        /// Product UID
        uid: String,
    },
}

/// Arguments for the package command
#[derive(Parser, Debug)]
pub struct PackageArgs {
    #[command(subcommand)]
    pub action: PackageAction,
}

impl PackageArgs {
    pub fn execute(self, ctx: &Context) -> anyhow::Result<ExitCode> {
        match self.action {
            PackageAction::New { force } => {
                if ctx.package_path.exists() && !force {
                    bail!(
                        "{} already exists; use --force to replace it",
                        ctx.package_path.display()
                    );
                }
                ctx.save_package(&Package::new())?;
                let path = ctx.package_path.display().to_string();
                ctx.done("package new", format!("Empty package written to {path}"))
            }
            PackageAction::Version { version } => {
                let mut package = ctx.load_package()?;
                package.set_version(version.as_str());
                ctx.save_package(&package)?;
                ctx.done("package version", format!("Version set to {version}"))
            }
            PackageAction::Show => {
                let package = ctx.load_package()?;
                ctx.emit(ctx.formatter.format_package(&package));
                Ok(ExitCode::Success)
            }
            PackageAction::Metadata { output_file } => {
                let mut package = ctx.load_package()?;
                let chunk_size = ctx.settings.chunk_size()?;
                ctx.formatter.progress("Hashing objects...");
                match output_file {
                    Some(path) => {
                        package.export_metadata(&path, chunk_size)?;
                        let path = path.display().to_string();
                        ctx.done("package metadata", format!("Metadata written to {path}"))
                    }
                    None => {
                        let metadata = package.metadata(chunk_size)?;
                        match ctx.formatter.format() {
                            OutputFormat::Table => {
                                println!("{}", serde_json::to_string_pretty(&metadata)?)
                            }
                            OutputFormat::Json => ctx.emit(
                                ctx.formatter.format_success(&metadata, "package metadata"),
                            ),
                            OutputFormat::Quiet => {}
                        }
                        Ok(ExitCode::Success)
                    }
                }
            }
        }
    }
}

/// Package subcommands
#[derive(Subcommand, Debug)]
pub enum PackageAction {
    /// Write an empty package file
    New {
        /// Replace an existing package file
        #[arg(long)]
        force: bool,
    },
    /// Set the package version
    Version {
        /// Version string
        version: String,
    },
    /// Show package contents
    Show,
    /// Hash every object and print or write the package metadata
    Metadata {
        /// Write metadata to this file instead of stdout
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
}

/// Arguments for the object command
#[derive(Parser, Debug)]
pub struct ObjectArgs {
    #[command(subcommand)]
    pub action: ObjectAction,
}

impl ObjectArgs {
    pub fn execute(self, ctx: &Context) -> anyhow::Result<ExitCode> {
        let mut package = ctx.load_package()?;
        match self.action {
            ObjectAction::Add {
                file,
                mode,
                options,
                sets,
            } => {
                let mode: Mode = mode.parse()?;
                let mut inputs = group_inputs(options)?;
                inputs.insert(OptionName::Filename, SetValue::Shared(file.as_str().into()));

                let count = match sets {
                    Some(count) => Some(count),
                    None if package.objects().is_empty() => per_set_count(&inputs),
                    None => None,
                };
                if !std::path::Path::new(&file).exists() {
                    ctx.formatter
                        .warning(&format!("{file} does not exist yet"));
                }

                let index = package.add_object(mode, &inputs, count)?;
                ctx.save_package(&package)?;
                ctx.done("object add", format!("Object {index} added ({mode}, {file})"))
            }
            ObjectAction::Remove { index } => {
                package.remove_object(index)?;
                ctx.save_package(&package)?;
                ctx.done("object remove", format!("Object {index} removed"))
            }
            ObjectAction::Edit {
                index,
                option,
                value,
                set,
            } => {
                let name: OptionName = option.parse()?;
                package
                    .objects_mut()
                    .set_option(index, set, name, OptionValue::from(value))?;
                ctx.save_package(&package)?;
                ctx.done("object edit", format!("Object {index} option {name} updated"))
            }
        }
    }
}

/// Object subcommands
#[derive(Subcommand, Debug)]
pub enum ObjectAction {
    /// Add an object to every installation set
    Add {
        /// Object file
        file: String,
        /// Installation mode
        #[arg(long)]
        mode: String,
        /// Option value; repeat a key once per installation set for per-set values
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        options: Vec<(String, String)>,
        /// Number of installation sets (first object only)
        #[arg(long)]
        sets: Option<usize>,
    },
    /// Remove an object from every installation set
    Remove {
        /// Object index
        index: usize,
    },
    /// Change one option of an object
    Edit {
        /// Object index
        index: usize,
        /// Option name
        option: String,
        /// New value
        value: String,
        /// Installation set, for per-set options
        #[arg(long)]
        set: Option<usize>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

/// Group `key=value` pairs by option. A key given once is shared by every
/// installation set; a repeated key holds one value per set, in order.
pub fn group_inputs(pairs: Vec<(String, String)>) -> Result<ObjectInputs, UhuError> {
    let mut grouped: BTreeMap<OptionName, Vec<OptionValue>> = BTreeMap::new();
    for (key, value) in pairs {
        let name: OptionName = key.parse()?;
        grouped.entry(name).or_default().push(OptionValue::from(value));
    }
    Ok(grouped
        .into_iter()
        .map(|(name, mut values)| {
            let input = if values.len() == 1 {
                SetValue::Shared(values.remove(0))
            } else {
                SetValue::PerSet(values)
            };
            (name, input)
        })
        .collect())
}

/// Set count implied by per-set inputs, if any.
fn per_set_count(inputs: &ObjectInputs) -> Option<usize> {
    inputs
        .values()
        .filter_map(|input| match input {
            SetValue::PerSet(values) => Some(values.len()),
            SetValue::Shared(_) => None,
        })
        .max()
}

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::Level;

use scrollharvest::config::{CollectorConfig, ConfigManager};
use scrollharvest::core::{print_error_message, print_info_message};
use scrollharvest::driver::{DriverConfig, ReplayHost, ScrollDriver, ThreadClock};
use scrollharvest::env::{self, EnvVar};
use scrollharvest::error::{HarvestError, HarvestResult};
use scrollharvest::export::{
    default_export_name, to_data_url, to_export_string, write_records, Delimiter, ExportColumns,
};
use scrollharvest::extract::{extract_page, PageContext, Profile, RuleExtractor};
use scrollharvest::parsers::html::html_to_dom;
use scrollharvest::store::{RecordStore, RedbBackend};

#[derive(Parser)]
#[command(name = "scrollharvest", version)]
#[command(about = "Incrementally collect records from infinitely scrolling pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Record store file, overrides the configuration
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay saved page frames through the scroll driver
    Collect {
        /// Profile name
        profile: String,

        /// Directory of saved HTML frames, replayed in name order
        frames: PathBuf,

        /// Store capacity, overrides the configuration
        #[arg(long)]
        max_records: Option<usize>,

        /// Stop at the first item dated before this day (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Field holding the item date
        #[arg(long, default_value = "date")]
        since_field: String,

        /// Upper bound on scroll cycles
        #[arg(long)]
        max_cycles: Option<u32>,

        /// Skip all pauses
        #[arg(long)]
        no_delay: bool,

        /// Encoding of the saved frames
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },

    /// Extract records from a single saved page
    Extract {
        /// Profile name
        profile: String,

        /// Saved HTML file
        file: PathBuf,

        /// Also insert the records into the store
        #[arg(long)]
        save: bool,

        /// Output format: csv, tsv, pipe
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Encoding of the saved page
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },

    /// Export stored records
    Export {
        /// Profile name
        profile: String,

        /// Output file, `-` for stdout; defaults to the profile's export name
        #[arg(short, long)]
        output: Option<String>,

        /// Output format: csv, tsv, pipe
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Columns as `key[:label],...`
        #[arg(long)]
        columns: Option<String>,

        /// Omit the header row
        #[arg(long)]
        no_headers: bool,

        /// Print a data URL instead of writing a file
        #[arg(long)]
        data_url: bool,
    },

    /// Show stored record counts
    Stats {
        /// Profile name, all profiles when omitted
        profile: Option<String>,
    },

    /// Remove all stored records of a profile
    Clear {
        /// Profile name
        profile: String,
    },

    /// List available profiles
    Profiles,

    /// Download stored record URLs (images)
    Download {
        /// Profile name
        profile: String,

        /// Target directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// File name prefix
        #[arg(long, default_value = "")]
        prefix: String,

        /// First file index
        #[arg(long, default_value_t = 1)]
        start: usize,

        /// Delay between files in milliseconds, overrides the configuration
        #[arg(long)]
        delay_ms: Option<u64>,

        /// File extension, inferred from each URL when omitted
        #[arg(long)]
        ext: Option<String>,

        /// Clear the store afterwards
        #[arg(long)]
        cleanup: bool,
    },

    /// Write an example configuration file
    InitConfig {
        /// Target path
        #[arg(default_value = "scrollharvest.toml")]
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    if let Err(e) = run(cli) {
        print_error_message(&format!("Error: {}", e));
        process::exit(1);
    }
}

fn init_logging(flag: Option<&str>) {
    let level = flag
        .map(str::to_string)
        .or_else(|| env::core::LogLevel::get().ok())
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_ansi(!env::core::NoColor::get_or_default(false))
        .init();
}

fn run(cli: Cli) -> HarvestResult<()> {
    if let Commands::InitConfig { path } = &cli.command {
        ConfigManager::generate_example_config(path)?;
        print_info_message(&format!("已生成配置文件: {}", path.display()));
        return Ok(());
    }

    let mut config = ConfigManager::load(cli.config.as_deref())?;
    if let Some(store) = &cli.store {
        config.store_path = store.to_string_lossy().into_owned();
    }

    match cli.command {
        Commands::Collect {
            profile,
            frames,
            max_records,
            since,
            since_field,
            max_cycles,
            no_delay,
            encoding,
        } => {
            if let Some(max) = max_records {
                config.max_records = max;
            }
            if max_cycles.is_some() {
                config.max_cycles = max_cycles;
            }
            if no_delay {
                config.scroll_delay_ms = 0;
                config.load_check_delay_ms = 0;
            }
            config.validate()?;
            let since = since.as_deref().map(parse_date).transpose()?;
            collect(&config, &profile, &frames, since.map(|d| (since_field, d)), &encoding)
        }
        Commands::Extract {
            profile,
            file,
            save,
            format,
            encoding,
        } => extract(&config, &profile, &file, save, format.parse()?, &encoding),
        Commands::Export {
            profile,
            output,
            format,
            columns,
            no_headers,
            data_url,
        } => {
            let delimiter: Delimiter = format.parse()?;
            let options = ExportArgs {
                output,
                delimiter,
                columns,
                include_headers: !no_headers,
                data_url,
            };
            export(&config, &profile, options)
        }
        Commands::Stats { profile } => stats(&config, profile.as_deref()),
        Commands::Clear { profile } => {
            let resolved = config.profile(&profile)?;
            let backend = open_backend(&config)?;
            let mut store = RecordStore::open(&backend, &resolved.storage_key, config.max_records)?;
            let removed = store.len();
            store.clear()?;
            print_info_message(&format!("已清除 {} 条记录 ({})", removed, profile));
            Ok(())
        }
        Commands::Profiles => {
            for name in config.profile_names() {
                let profile = config.profile(&name)?;
                print_info_message(&format!("{:<12} {}", name, profile.storage_key));
            }
            Ok(())
        }
        Commands::Download {
            profile,
            dir,
            prefix,
            start,
            delay_ms,
            ext,
            cleanup,
        } => {
            let delay = delay_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or_else(|| config.download_delay());
            let options = scrollharvest::network::DownloadOptions {
                dir,
                prefix,
                start,
                delay,
                extension: ext,
            };
            download(&config, &profile, &options, cleanup)
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn parse_date(text: &str) -> HarvestResult<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| HarvestError::Parse(format!("日期无效 '{}': {}", text, e)))
}

fn open_backend(config: &CollectorConfig) -> HarvestResult<RedbBackend> {
    RedbBackend::open(&config.store_path())
}

fn build_extractor(
    profile_name: &str,
    profile: &Profile,
    since: Option<(String, NaiveDate)>,
) -> HarvestResult<RuleExtractor> {
    let extractor = profile.extractor(profile_name)?;
    Ok(match since {
        Some((field, date)) => extractor.with_since(&field, date),
        None => extractor,
    })
}

fn collect(
    config: &CollectorConfig,
    profile_name: &str,
    frames: &Path,
    since: Option<(String, NaiveDate)>,
    encoding: &str,
) -> HarvestResult<()> {
    let profile = config.profile(profile_name)?;
    let extractor = build_extractor(profile_name, &profile, since)?;
    let driver_config = DriverConfig::from_config(config, &profile);

    let host = ReplayHost::from_dir(
        frames,
        extractor.rules().item_selector.clone(),
        profile.container.clone(),
    )?
    .bottom_margin(driver_config.bottom_margin)
    .encoding(encoding)
    .with_base_url(profile.base_url());

    let backend = open_backend(config)?;
    let store = RecordStore::open(&backend, &profile.storage_key, config.max_records)?;

    let mut driver = ScrollDriver::new(driver_config, extractor, store, host, ThreadClock)
        .with_fallback_url(profile.base_url());
    let summary = driver.run()?;

    print_info_message(&format!(
        "{}: 新增 {} 条，淘汰 {} 条，跳过 {} 个节点，当前共 {} 条（滚动 {} 次，检查 {} 次）",
        summary
            .reason
            .map(|r| r.to_string())
            .unwrap_or_default(),
        summary.added,
        summary.evicted,
        summary.skipped,
        driver.store().len(),
        summary.cycles,
        summary.checks
    ));
    if summary.load_timeouts > 0 {
        print_info_message(&format!("加载超时 {} 次", summary.load_timeouts));
    }
    if summary.persistence_failures > 0 {
        print_error_message(&format!("保存失败 {} 次", summary.persistence_failures));
    }
    Ok(())
}

fn extract(
    config: &CollectorConfig,
    profile_name: &str,
    file: &Path,
    save: bool,
    delimiter: Delimiter,
    encoding: &str,
) -> HarvestResult<()> {
    let profile = config.profile(profile_name)?;
    let extractor = build_extractor(profile_name, &profile, None)?;

    let data = fs::read(file)?;
    let dom = html_to_dom(&data, encoding);
    let page = PageContext::new(&dom, profile.base_url());
    let extraction = extract_page(&extractor, &page)?;

    let columns = ExportColumns::from_profile(&profile);
    let stdout = io::stdout();
    write_records(
        stdout.lock(),
        &extraction.records,
        &columns,
        delimiter,
        true,
    )?;

    if save {
        let backend = open_backend(config)?;
        let mut store = RecordStore::open(&backend, &profile.storage_key, config.max_records)?;
        let report = store.insert(extraction.records)?;
        // stdout 已用于输出记录
        eprintln!(
            "已保存 {} 条，淘汰 {} 条，当前共 {} 条",
            report.added,
            report.evicted,
            store.len()
        );
    }
    Ok(())
}

struct ExportArgs {
    output: Option<String>,
    delimiter: Delimiter,
    columns: Option<String>,
    include_headers: bool,
    data_url: bool,
}

fn export(config: &CollectorConfig, profile_name: &str, args: ExportArgs) -> HarvestResult<()> {
    let profile = config.profile(profile_name)?;
    let backend = open_backend(config)?;
    let store = RecordStore::open(&backend, &profile.storage_key, config.max_records)?;

    if store.is_empty() {
        return Err(HarvestError::Config(format!(
            "没有可导出的数据 ({})",
            profile_name
        )));
    }

    let columns = match &args.columns {
        Some(list) => ExportColumns::parse(list)?,
        None => ExportColumns::from_profile(&profile),
    };

    if args.data_url {
        let text = to_export_string(store.iter(), &columns, args.delimiter, args.include_headers);
        print_info_message(&to_data_url(&text));
        return Ok(());
    }

    let output = args
        .output
        .unwrap_or_else(|| default_export_name(profile_name, &profile, args.delimiter));

    if output == "-" {
        let stdout = io::stdout();
        write_records(
            stdout.lock(),
            store.iter(),
            &columns,
            args.delimiter,
            args.include_headers,
        )?;
        return Ok(());
    }

    let mut file = io::BufWriter::new(fs::File::create(&output)?);
    let written = write_records(
        &mut file,
        store.iter(),
        &columns,
        args.delimiter,
        args.include_headers,
    )?;
    file.flush()?;
    print_info_message(&format!("已导出 {} 条记录到 {}", written, output));
    Ok(())
}

fn stats(config: &CollectorConfig, profile: Option<&str>) -> HarvestResult<()> {
    let backend = open_backend(config)?;
    let names = match profile {
        Some(name) => vec![name.to_string()],
        None => config.profile_names(),
    };

    for name in names {
        let resolved = config.profile(&name)?;
        let store = RecordStore::open(&backend, &resolved.storage_key, config.max_records)?;
        let latest = store
            .latest()
            .map(|r| r.collected_at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        print_info_message(&format!(
            "{:<12} {:>6}/{:<6} 最近采集: {}",
            name,
            store.len(),
            store.capacity(),
            latest
        ));
    }
    Ok(())
}

#[cfg(feature = "download")]
fn download(
    config: &CollectorConfig,
    profile_name: &str,
    options: &scrollharvest::network::DownloadOptions,
    cleanup: bool,
) -> HarvestResult<()> {
    use scrollharvest::network::{download_records, HttpFetcher};

    let profile = config.profile(profile_name)?;
    let backend = open_backend(config)?;
    let mut store = RecordStore::open(&backend, &profile.storage_key, config.max_records)?;
    if store.is_empty() {
        return Err(HarvestError::Config(format!(
            "没有可下载的数据 ({})",
            profile_name
        )));
    }

    // 按采集顺序下载：存储中最新在前
    let records: Vec<_> = store.records().into_iter().rev().collect();
    let fetcher = HttpFetcher::new(&config.user_agent, config.timeout())?;
    let report = download_records(&fetcher, &mut ThreadClock, &records, options)?;

    print_info_message(&format!(
        "下载完成: 成功 {} 个，失败 {} 个",
        report.saved.len(),
        report.failed.len()
    ));

    if cleanup {
        store.clear()?;
        print_info_message("已清除存储的记录");
    }
    Ok(())
}

#[cfg(not(feature = "download"))]
fn download(
    _config: &CollectorConfig,
    _profile_name: &str,
    _options: &scrollharvest::network::DownloadOptions,
    _cleanup: bool,
) -> HarvestResult<()> {
    Err(HarvestError::Config(
        "未启用下载功能，请使用 --features download 重新编译".to_string(),
    ))
}

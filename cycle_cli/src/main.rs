use chrono::{Datelike, NaiveDate};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use cycle_core::export::{self, default_export_file_name};
use cycle_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "luna")]
#[command(about = "Personal menstrual cycle tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cycle day, phase and days until the next period (default)
    Today {
        /// Reference date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Log a period
    LogPeriod {
        /// First day of the period
        #[arg(long)]
        start: NaiveDate,

        /// Last day of the period, if it has ended
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Flow (light, medium, heavy)
        #[arg(long, default_value = "medium")]
        flow: Flow,

        /// Cycle length in days (derived from --end, or 28)
        #[arg(long)]
        length: Option<u32>,
    },

    /// Close the most recent open period
    EndPeriod {
        /// Last day of the period (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Log symptoms for a day
    LogSymptoms {
        /// Day of the symptoms (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Symptom tag; repeat for several (e.g. --symptom cramps --symptom fatigue)
        #[arg(long = "symptom", required = true)]
        symptoms: Vec<String>,

        /// Intensity (mild, moderate, severe)
        #[arg(long)]
        intensity: Option<Intensity>,
    },

    /// Add a note for a day
    Note {
        /// Day of the note (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Note text
        #[arg(long)]
        content: String,
    },

    /// List logged records
    List {
        /// Which records to list (all when omitted)
        kind: Option<KindArg>,
    },

    /// Delete a record by id
    Delete { kind: KindArg, id: String },

    /// Predict the next period, ovulation and fertile window
    Predict,

    /// Show statistics over the logged history
    Insights,

    /// Show a month calendar
    Calendar {
        /// Month as YYYY-MM (defaults to the current month)
        #[arg(long)]
        month: Option<String>,
    },

    /// Export data to a file
    Export {
        /// json (everything) or csv (cycles only)
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Output path (defaults to cycle-data-<date>.<ext>)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Import a JSON export or a cycle CSV
    Import { file: PathBuf },

    /// Show or change preferences
    Prefs {
        #[arg(long)]
        theme: Option<Theme>,

        #[arg(long)]
        language: Option<Language>,

        #[arg(long, action = ArgAction::Set)]
        period_reminders: Option<bool>,

        #[arg(long, action = ArgAction::Set)]
        ovulation_reminders: Option<bool>,

        #[arg(long, action = ArgAction::Set)]
        fertile_window: Option<bool>,

        #[arg(long, action = ArgAction::Set)]
        daily_check: Option<bool>,
    },

    /// Rewrite the journal without superseded events
    Compact,

    /// Delete all logged records and the local cache
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    #[value(alias = "cycles")]
    Cycle,
    #[value(alias = "symptoms")]
    Symptom,
    #[value(alias = "notes")]
    Note,
}

fn main() -> Result<()> {
    cycle_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }

    match cli.command.unwrap_or(Commands::Today { date: None }) {
        Commands::Today { date } => cmd_today(&config, date.unwrap_or_else(local_today)),
        Commands::LogPeriod {
            start,
            end,
            flow,
            length,
        } => cmd_log_period(&config, start, end, flow, length),
        Commands::EndPeriod { date } => cmd_end_period(&config, date.unwrap_or_else(local_today)),
        Commands::LogSymptoms {
            date,
            symptoms,
            intensity,
        } => cmd_log_symptoms(&config, date.unwrap_or_else(local_today), symptoms, intensity),
        Commands::Note { date, content } => {
            cmd_note(&config, date.unwrap_or_else(local_today), content)
        }
        Commands::List { kind } => cmd_list(&config, kind),
        Commands::Delete { kind, id } => cmd_delete(&config, kind, &id),
        Commands::Predict => cmd_predict(&config),
        Commands::Insights => cmd_insights(&config),
        Commands::Calendar { month } => cmd_calendar(&config, month.as_deref()),
        Commands::Export { format, out } => cmd_export(
            &config,
            format.unwrap_or(config.export.default_format),
            out,
        ),
        Commands::Import { file } => cmd_import(&config, &file),
        Commands::Prefs {
            theme,
            language,
            period_reminders,
            ovulation_reminders,
            fertile_window,
            daily_check,
        } => cmd_prefs(&config, |prefs| {
            if let Some(theme) = theme {
                prefs.theme = theme;
            }
            if let Some(language) = language {
                prefs.language = language;
            }
            let notifications = &mut prefs.notifications;
            if let Some(on) = period_reminders {
                notifications.period_reminders = on;
            }
            if let Some(on) = ovulation_reminders {
                notifications.ovulation_reminders = on;
            }
            if let Some(on) = fertile_window {
                notifications.fertile_window = on;
            }
            if let Some(on) = daily_check {
                notifications.daily_check = on;
            }
        }),
        Commands::Compact => cmd_compact(&config),
        Commands::Clear { yes } => cmd_clear(&config, yes),
    }
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn open_store(config: &Config) -> JournalStore {
    JournalStore::new(config.journal_path())
}

/// Snapshot from the journal, or from the local cache if the journal fails
fn load_data(config: &Config) -> Result<CycleData> {
    let store = open_store(config);
    let cache = config
        .storage
        .cache_enabled
        .then(|| SnapshotCache::in_dir(&config.data.data_dir));

    let loaded = load_with_fallback(&store, cache.as_ref())?;
    if let Some(ref e) = loaded.primary_error {
        eprintln!("Warning: could not read records ({}).", e);
        eprintln!("Showing cached data; retry once the problem is fixed.");
    }
    Ok(loaded.data)
}

fn cmd_today(config: &Config, date: NaiveDate) -> Result<()> {
    let data = load_data(config)?;
    let info = today_info(date, &data.cycles);

    println!("\n  Today: {}", date.format("%a %b %-d, %Y"));
    println!("  Cycle day: {}", info.cycle_day);
    println!("  Phase: {}", info.phase);
    match info.days_until_next {
        Some(days) => println!("  Next period in: {} days", days),
        None => println!("  Next period in: ?"),
    }
    println!("  On period: {}", if info.is_on_period { "yes" } else { "no" });

    if data.cycles.is_empty() {
        println!("\nNo cycles logged yet. Start with `luna log-period --start YYYY-MM-DD`.");
    }
    println!();
    Ok(())
}

fn cmd_log_period(
    config: &Config,
    start: NaiveDate,
    end: Option<NaiveDate>,
    flow: Flow,
    length: Option<u32>,
) -> Result<()> {
    let cycle = CycleRecord::new(start, end, flow, length)?;
    let cycle = open_store(config).add_cycle(cycle)?;

    println!("✓ Period logged!");
    println!("  ID: {}", cycle.id);
    println!("  {} ({} flow, {} days)", describe_range(&cycle), cycle.flow, cycle.effective_length());
    Ok(())
}

fn cmd_end_period(config: &Config, date: NaiveDate) -> Result<()> {
    let mut store = open_store(config);
    let data = store.snapshot()?;

    let Some(open) = most_recent_cycle(&data.cycles).filter(|c| c.end_date.is_none()) else {
        println!("No open period to end.");
        return Ok(());
    };

    let closed = store.replace_cycle(open.with_end_date(date)?)?;
    println!("✓ Period ended!");
    println!("  {} ({} days)", describe_range(&closed), closed.effective_length());
    Ok(())
}

fn cmd_log_symptoms(
    config: &Config,
    date: NaiveDate,
    symptoms: Vec<String>,
    intensity: Option<Intensity>,
) -> Result<()> {
    for tag in symptoms.iter().filter(|t| !catalog::is_known(t.trim())) {
        tracing::warn!("Logging symptom '{}' outside the built-in vocabulary", tag);
    }

    let intensity = intensity.unwrap_or_else(|| match symptoms.as_slice() {
        [only] => catalog::suggested_intensity(only.trim()),
        _ => Intensity::default(),
    });

    let entry = SymptomEntry::new(date, symptoms, intensity)?;
    let entry = open_store(config).add_symptom(entry)?;

    println!("✓ Symptoms logged!");
    println!("  ID: {}", entry.id);
    println!("  {}: {} ({})", entry.date, describe_symptoms(&entry.symptoms), entry.intensity);
    Ok(())
}

fn cmd_note(config: &Config, date: NaiveDate, content: String) -> Result<()> {
    let note = open_store(config).add_note(NoteEntry::new(date, content)?)?;

    println!("✓ Note saved!");
    println!("  ID: {}", note.id);
    Ok(())
}

fn cmd_list(config: &Config, kind: Option<KindArg>) -> Result<()> {
    let mut data = load_data(config)?;
    data.cycles.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    data.symptoms.sort_by(|a, b| b.date.cmp(&a.date));
    data.notes.sort_by(|a, b| b.date.cmp(&a.date));

    if matches!(kind, None | Some(KindArg::Cycle)) {
        println!("Cycles ({})", data.cycles.len());
        for cycle in &data.cycles {
            println!(
                "  {}  {}  {} flow, {} days",
                cycle.id,
                describe_range(cycle),
                cycle.flow,
                cycle.effective_length()
            );
        }
    }

    if matches!(kind, None | Some(KindArg::Symptom)) {
        println!("Symptoms ({})", data.symptoms.len());
        for entry in &data.symptoms {
            println!(
                "  {}  {}  {} ({})",
                entry.id,
                entry.date,
                describe_symptoms(&entry.symptoms),
                entry.intensity
            );
        }
    }

    if matches!(kind, None | Some(KindArg::Note)) {
        println!("Notes ({})", data.notes.len());
        for note in &data.notes {
            println!("  {}  {}  {}", note.id, note.date, note.content);
        }
    }

    Ok(())
}

fn cmd_delete(config: &Config, kind: KindArg, id: &str) -> Result<()> {
    let mut store = open_store(config);
    match kind {
        KindArg::Cycle => store.delete_cycle(id)?,
        KindArg::Symptom => store.delete_symptom(id)?,
        KindArg::Note => store.delete_note(id)?,
    }

    println!("✓ Deleted {}", id);
    Ok(())
}

fn cmd_predict(config: &Config) -> Result<()> {
    let data = load_data(config)?;

    let Some(prediction) = compute_prediction(&data.cycles) else {
        println!("No predictions yet. Log a period to get started.");
        return Ok(());
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  UPCOMING PREDICTIONS");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Next period:    {}", prediction.next_period);
    println!("  Ovulation:      {}", prediction.ovulation);
    println!(
        "  Fertile window: {} → {}",
        prediction.fertile_window.start, prediction.fertile_window.end
    );
    println!("  Avg cycle:      {} days", prediction.avg_cycle_length);
    println!();
    Ok(())
}

fn cmd_insights(config: &Config) -> Result<()> {
    let data = load_data(config)?;

    let Some(insights) = compute_insights(&data.cycles, &data.symptoms) else {
        println!("No insights yet. Start logging your cycles to see trends.");
        return Ok(());
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  HEALTH INSIGHTS");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Total cycles tracked: {}", insights.total_cycles);
    println!("  Average cycle length: {} days", insights.avg_cycle_length);
    println!("  Most common flow:     {}", insights.most_common_flow);
    println!(
        "  Cycle regularity:     {} ({}-{} days, spread {})",
        insights.regularity, insights.min_length, insights.max_length, insights.length_variation
    );

    if !insights.top_symptoms.is_empty() {
        println!();
        println!("  Top symptoms:");
        for (rank, top) in insights.top_symptoms.iter().enumerate() {
            println!(
                "    {}. {} ({}x)",
                rank + 1,
                catalog::label(&top.symptom),
                top.count
            );
        }
    }
    println!();
    Ok(())
}

fn cmd_calendar(config: &Config, month: Option<&str>) -> Result<()> {
    let (year, month) = match month {
        Some(s) => parse_month(s)?,
        None => {
            let today = local_today();
            (today.year(), today.month())
        }
    };

    let data = load_data(config)?;
    let prediction = compute_prediction(&data.cycles);
    let grid = month_grid(year, month);

    println!("\n  {}-{:02}", year, month);
    println!("  Sun  Mon  Tue  Wed  Thu  Fri  Sat");

    for week in grid.chunks(7) {
        let mut line = String::from(" ");
        for cell in week {
            match cell {
                Some(date) => {
                    let info = day_info(*date, &data, prediction.as_ref());
                    let logged = if info.symptoms.is_some() || info.note.is_some() {
                        '*'
                    } else {
                        ' '
                    };
                    line.push_str(&format!(" {:>2}{}{}", date.day(), mark_symbol(info.mark), logged));
                }
                None => line.push_str("     "),
            }
        }
        println!("{}", line.trim_end());
    }

    println!();
    println!("  P period  O ovulation  F fertile  ~ predicted period  * symptoms/notes");
    println!();
    Ok(())
}

fn parse_month(s: &str) -> Result<(i32, u32)> {
    let invalid = || Error::Validation(format!("invalid month '{}', expected YYYY-MM", s));

    let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

fn mark_symbol(mark: DayMark) -> char {
    match mark {
        DayMark::Period => 'P',
        DayMark::PredictedOvulation => 'O',
        DayMark::Fertile => 'F',
        DayMark::PredictedPeriod => '~',
        DayMark::None => ' ',
    }
}

fn cmd_export(config: &Config, format: ExportFormat, out: Option<PathBuf>) -> Result<()> {
    let data = load_data(config)?;
    let path = out.unwrap_or_else(|| PathBuf::from(default_export_file_name(local_today(), format)));

    match format {
        ExportFormat::Json => {
            let prefs = UserPreferences::load(&config.preferences_path());
            let document = ExportDocument::new(data, Some(prefs));
            export::export_json(&path, &document)?;
            println!(
                "✓ Exported {} cycles, {} symptom entries, {} notes",
                document.cycles.len(),
                document.symptoms.len(),
                document.notes.len()
            );
        }
        ExportFormat::Csv => {
            let count = export::export_cycles_csv(&path, &data.cycles)?;
            println!("✓ Exported {} cycles", count);
        }
    }

    println!("  File: {}", path.display());
    Ok(())
}

fn cmd_import(config: &Config, file: &Path) -> Result<()> {
    let mut store = open_store(config);
    let summary = export::import_file(&mut store, file)?;

    println!(
        "✓ Imported {} cycles, {} symptom entries, {} notes",
        summary.cycles, summary.symptoms, summary.notes
    );
    if summary.skipped > 0 {
        println!("  Skipped {} records already present", summary.skipped);
    }
    if summary.invalid > 0 {
        println!("  Skipped {} invalid records", summary.invalid);
    }
    Ok(())
}

fn cmd_prefs<F>(config: &Config, apply: F) -> Result<()>
where
    F: FnOnce(&mut UserPreferences),
{
    let path = config.preferences_path();
    let before = UserPreferences::load(&path);

    let mut changed = before.clone();
    apply(&mut changed);

    let prefs = if changed != before {
        UserPreferences::update(&path, |prefs| {
            *prefs = changed;
            Ok(())
        })?
    } else {
        before
    };

    let on_off = |on: bool| if on { "on" } else { "off" };
    println!("Theme:               {:?}", prefs.theme);
    println!("Language:            {:?}", prefs.language);
    println!("Period reminders:    {}", on_off(prefs.notifications.period_reminders));
    println!("Ovulation reminders: {}", on_off(prefs.notifications.ovulation_reminders));
    println!("Fertile window:      {}", on_off(prefs.notifications.fertile_window));
    println!("Daily check-in:      {}", on_off(prefs.notifications.daily_check));
    Ok(())
}

fn cmd_compact(config: &Config) -> Result<()> {
    let mut store = open_store(config);
    if !store.path().exists() {
        println!("No journal found - nothing to compact.");
        return Ok(());
    }

    let dropped = store.compact()?;
    println!("✓ Compacted journal, dropped {} superseded events", dropped);
    Ok(())
}

fn cmd_clear(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        eprintln!("This deletes every logged record. Re-run with --yes to confirm.");
        return Err(Error::Other("clear not confirmed".into()));
    }

    export::clear_all(
        &mut open_store(config),
        &SnapshotCache::in_dir(&config.data.data_dir),
    )?;
    println!("✓ All records cleared");
    Ok(())
}

fn describe_range(cycle: &CycleRecord) -> String {
    match cycle.end_date {
        Some(end) => format!("{} → {}", cycle.start_date, end),
        None => format!("{} → ongoing", cycle.start_date),
    }
}

fn describe_symptoms(tags: &[String]) -> String {
    tags.iter()
        .map(|t| catalog::label(t))
        .collect::<Vec<_>>()
        .join(", ")
}

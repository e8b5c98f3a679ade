//! Shared output layer for pretty/text/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: framed output for humans, tab-separated rows for scripts, or
//! stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format`
//! 2. `--json`
//! 3. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 4. `output` in the user config file
//! 5. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use clap::ValueEnum;
use csm_core::config::normalize_output_mode;
use csm_core::error::CsmError;
use csm_core::model::{Account, Task, format_optional_date};
use csm_core::okr::OkrProgress;
use serde::Serialize;
use std::fmt;
use std::io::{self, IsTerminal, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 60;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (sections, bars, visual framing).
    Pretty,
    /// Tab-separated rows for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    fn from_name(raw: &str) -> Option<Self> {
        match normalize_output_mode(raw)? {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            _ => Some(Self::Pretty),
        }
    }
}

fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    user_pref: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }
    if json_flag {
        return OutputMode::Json;
    }
    if let Some(mode) = format_env.and_then(OutputMode::from_name) {
        return mode;
    }
    if let Some(mode) = user_pref.and_then(OutputMode::from_name) {
        return mode;
    }
    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from flags, environment, user config, and TTY.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    user_pref: Option<&str>,
) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(format_flag, json_flag, env_val.as_deref(), user_pref, is_tty)
}

/// Trait implemented by any CLI result type that can be rendered in all modes.
pub trait Renderable {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Render as a self-contained JSON value.
    fn render_json(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Render as a single text row, in [`Renderable::table_headers`] order.
    fn render_table(&self, w: &mut dyn Write) -> io::Result<()>;

    fn table_headers() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[]
    }
}

/// Render a single [`Renderable`] item to stdout using the given output mode.
pub fn render_item<R: Renderable>(item: &R, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_item(item, mode, &mut out)
}

fn write_item<R: Renderable>(item: &R, mode: OutputMode, out: &mut dyn Write) -> io::Result<()> {
    match mode {
        OutputMode::Pretty => item.render_human(out),
        OutputMode::Text => item.render_table(out),
        OutputMode::Json => {
            item.render_json(out)?;
            writeln!(out)
        }
    }
}

/// Render a list of [`Renderable`] items to stdout.
///
/// JSON mode wraps the items in an array; text mode prints a header row
/// first when the list is non-empty.
pub fn render_list<R: Renderable>(items: &[R], mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_list(items, mode, &mut out)
}

fn write_list<R: Renderable>(items: &[R], mode: OutputMode, out: &mut dyn Write) -> io::Result<()> {
    match mode {
        OutputMode::Pretty => {
            for item in items {
                item.render_human(out)?;
            }
        }
        OutputMode::Text => {
            if !items.is_empty() && !R::table_headers().is_empty() {
                writeln!(out, "{}", R::table_headers().join("\t"))?;
            }
            for item in items {
                item.render_table(out)?;
            }
        }
        OutputMode::Json => {
            write!(out, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(out, ",")?;
                }
                writeln!(out)?;
                item.render_json(out)?;
            }
            writeln!(out, "\n]")?;
        }
    }
    Ok(())
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

fn json_to(w: &mut dyn Write, value: &impl Serialize) -> io::Result<()> {
    serde_json::to_writer_pretty(w, value).map_err(io::Error::other)
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

pub struct TaskRow<'a>(pub &'a Task);

impl Renderable for TaskRow<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let t = self.0;
        let mark = if t.completed { "x" } else { " " };
        write!(
            w,
            "[{mark}] #{:<4} {:<7} {}",
            t.id.unwrap_or_default(),
            t.task_type,
            t.name
        )?;
        if let Some(due) = t.due {
            write!(w, "  (due {due})")?;
        }
        if let Some(account) = &t.account_name {
            write!(w, "  @{account}")?;
        }
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        json_to(w, self.0)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let t = self.0;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            t.id.unwrap_or_default(),
            t.task_type,
            t.name,
            or_dash(&format_optional_date(t.due)),
            t.completed,
            t.account_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            or_dash(t.account_name.as_deref().unwrap_or_default()),
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "TYPE", "NAME", "DUE", "COMPLETED", "ACCOUNT_ID", "ACCOUNT"]
    }
}

/// Full detail view of one task.
pub struct TaskDetail<'a>(pub &'a Task);

impl Renderable for TaskDetail<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let t = self.0;
        pretty_section(w, &format!("Task #{}", t.id.unwrap_or_default()))?;
        pretty_kv(w, "Name", &t.name)?;
        pretty_kv(w, "Type", t.task_type.as_str())?;
        pretty_kv(w, "Due", or_dash(&format_optional_date(t.due)))?;
        pretty_kv(w, "Completed", if t.completed { "yes" } else { "no" })?;
        match (t.account_id, &t.account_name) {
            (Some(id), Some(name)) => pretty_kv(w, "Account", format!("{name} (#{id})")),
            (Some(id), None) => pretty_kv(w, "Account", format!("#{id}")),
            _ => pretty_kv(w, "Account", "-"),
        }
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        json_to(w, self.0)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        TaskRow(self.0).render_table(w)
    }

    fn table_headers() -> &'static [&'static str] {
        TaskRow::table_headers()
    }
}

pub struct AccountRow<'a>(pub &'a Account);

fn format_arr(arr: Option<f64>) -> String {
    arr.map_or_else(|| "-".to_string(), |v| format!("{v:.0}"))
}

impl Renderable for AccountRow<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let a = self.0;
        write!(w, "#{:<4} {}", a.id.unwrap_or_default(), a.name)?;
        if let Some(vertical) = a.vertical {
            write!(w, "  [{vertical}")?;
            if let Some(sub) = &a.sub_vertical {
                write!(w, " / {sub}")?;
            }
            write!(w, "]")?;
        }
        if a.arr.is_some() {
            write!(w, "  ARR ${}", format_arr(a.arr))?;
        }
        if let Some(renewal) = a.renewal_date {
            write!(w, "  renews {renewal}")?;
        }
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        json_to(w, self.0)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let a = self.0;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            a.id.unwrap_or_default(),
            a.name,
            a.vertical.map_or("-", |v| v.as_str()),
            or_dash(a.sub_vertical.as_deref().unwrap_or_default()),
            format_arr(a.arr),
            or_dash(&format_optional_date(a.renewal_date)),
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "NAME", "VERTICAL", "SUB_VERTICAL", "ARR", "RENEWAL"]
    }
}

pub struct AccountDetail<'a>(pub &'a Account);

impl Renderable for AccountDetail<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let a = self.0;
        pretty_section(w, &format!("Account #{}", a.id.unwrap_or_default()))?;
        pretty_kv(w, "Name", &a.name)?;
        pretty_kv(w, "Vertical", a.vertical.map_or("-", |v| v.as_str()))?;
        pretty_kv(
            w,
            "Sub-vertical",
            or_dash(a.sub_vertical.as_deref().unwrap_or_default()),
        )?;
        pretty_kv(w, "ARR", format_arr(a.arr))?;
        pretty_kv(w, "Renewal", or_dash(&format_optional_date(a.renewal_date)))
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        json_to(w, self.0)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        AccountRow(self.0).render_table(w)
    }

    fn table_headers() -> &'static [&'static str] {
        AccountRow::table_headers()
    }
}

const BAR_WIDTH: u32 = 20;

pub struct OkrRow<'a>(pub &'a OkrProgress);

impl OkrRow<'_> {
    /// `#` for completed, `-` for open, `.` for the rest of the target.
    fn bar(&self) -> String {
        let p = self.0;
        if p.target == 0 {
            return ".".repeat(BAR_WIDTH as usize);
        }
        let done = p.completed_portion * BAR_WIDTH / p.target;
        let open = (p.completed_portion + p.incomplete_portion) * BAR_WIDTH / p.target - done;
        let rest = BAR_WIDTH - done - open;
        format!(
            "{}{}{}",
            "#".repeat(done as usize),
            "-".repeat(open as usize),
            ".".repeat(rest as usize)
        )
    }
}

impl Renderable for OkrRow<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let p = self.0;
        writeln!(
            w,
            "{:<7} [{}] {}/{} done, {} total ({:.0}% complete, {:.0}% open)",
            p.task_type.as_str(),
            self.bar(),
            p.completed,
            p.target,
            p.total,
            p.percent_complete,
            p.percent_incomplete
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        json_to(w, self.0)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let p = self.0;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{:.1}\t{:.1}",
            p.task_type, p.total, p.completed, p.target, p.percent_complete, p.percent_incomplete
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["TYPE", "TOTAL", "COMPLETED", "TARGET", "PCT_COMPLETE", "PCT_OPEN"]
    }
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (`E####`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.into()),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

impl From<&CsmError> for CliError {
    fn from(err: &CsmError) -> Self {
        Self {
            message: err.to_string(),
            suggestion: Some(err.suggestion()),
            error_code: Some(err.error_code().to_string()),
        }
    }
}

impl From<&anyhow::Error> for CliError {
    fn from(err: &anyhow::Error) -> Self {
        if let Some(cli) = err.downcast_ref::<Self>() {
            return Self {
                message: cli.message.clone(),
                suggestion: cli.suggestion.clone(),
                error_code: cli.error_code.clone(),
            };
        }
        if let Some(core) = err.downcast_ref::<CsmError>() {
            return Self::from(core);
        }
        Self::new(format!("{err:#}"))
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(mode, error, &mut out)?;
    Ok(())
}

fn write_error(mode: OutputMode, error: &CliError, out: &mut dyn Write) -> io::Result<()> {
    match mode {
        OutputMode::Json => {
            json_to(out, &serde_json::json!({ "error": error }))?;
            writeln!(out)
        }
        OutputMode::Pretty | OutputMode::Text => {
            writeln!(out, "error: {}", error.message)?;
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csm_core::model::{AccountInput, RecordKind, TaskInput, TaskType};
    use csm_core::okr::{OkrTargets, aggregate};

    fn sample_task() -> Task {
        let mut task = TaskInput::new("Renewal review", "Risk")
            .due("2026-04-01")
            .validate()
            .expect("valid");
        task.id = Some(3);
        task.account_id = Some(1);
        task.account_name = Some("Acme".into());
        task
    }

    fn render_to_string(f: impl FnOnce(&mut dyn Write) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn format_flag_wins_over_everything() {
        let mode =
            resolve_output_mode_inner(Some(OutputMode::Text), true, Some("pretty"), Some("json"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn json_flag_wins_over_env_and_config() {
        let mode = resolve_output_mode_inner(None, true, Some("pretty"), Some("text"), true);
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn env_wins_over_user_config() {
        let mode = resolve_output_mode_inner(None, false, Some("TEXT"), Some("json"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn user_config_applies_before_tty_default() {
        let mode = resolve_output_mode_inner(None, false, None, Some("human"), false);
        assert_eq!(mode, OutputMode::Pretty);
    }

    #[test]
    fn unknown_values_fall_through_to_tty() {
        assert_eq!(
            resolve_output_mode_inner(None, false, Some("fancy"), Some("fancier"), true),
            OutputMode::Pretty
        );
        assert_eq!(
            resolve_output_mode_inner(None, false, None, None, false),
            OutputMode::Text
        );
    }

    #[test]
    fn task_row_text_and_json() {
        let task = sample_task();
        let text = render_to_string(|w| TaskRow(&task).render_table(w));
        assert_eq!(text, "3\tRisk\tRenewal review\t2026-04-01\tfalse\t1\tAcme\n");

        let json = render_to_string(|w| TaskRow(&task).render_json(w));
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["type"], "Risk");
        assert_eq!(value["due"], "2026-04-01");
        assert_eq!(value["account_name"], "Acme");
    }

    #[test]
    fn task_list_json_is_an_array() {
        let tasks = [sample_task(), sample_task()];
        let rows: Vec<_> = tasks.iter().map(TaskRow).collect();
        let json = render_to_string(|w| write_list(&rows, OutputMode::Json, w));
        let value: serde_json::Value = serde_json::from_str(&json).expect("json array");
        assert_eq!(value.as_array().map(Vec::len), Some(2));

        let empty: Vec<TaskRow<'_>> = Vec::new();
        let json = render_to_string(|w| write_list(&empty, OutputMode::Json, w));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&json).expect("json"),
            serde_json::json!([])
        );
    }

    #[test]
    fn text_list_prints_headers_once() {
        let tasks = [sample_task()];
        let rows: Vec<_> = tasks.iter().map(TaskRow).collect();
        let text = render_to_string(|w| write_list(&rows, OutputMode::Text, w));
        assert!(text.starts_with("ID\tTYPE\tNAME"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn account_detail_shows_classification() {
        let mut account = AccountInput::new("Acme")
            .vertical("HLS", Some("payer"))
            .arr("$2,500,000")
            .validate()
            .expect("valid");
        account.id = Some(8);
        let pretty = render_to_string(|w| AccountDetail(&account).render_human(w));
        assert!(pretty.contains("Account #8"));
        assert!(pretty.contains("Payer"));
        assert!(pretty.contains("2500000"));
    }

    #[test]
    fn okr_bar_is_capped_at_target() {
        let done: Vec<Task> = (0..6)
            .map(|_| {
                TaskInput::new("t", "Upsell")
                    .completed(true)
                    .validate()
                    .expect("valid")
            })
            .collect();
        let progress = aggregate(&done, &OkrTargets::default());
        let upsell = progress
            .iter()
            .find(|p| p.task_type == TaskType::Upsell)
            .expect("upsell");
        assert_eq!(OkrRow(upsell).bar(), "#".repeat(20));

        let story = progress
            .iter()
            .find(|p| p.task_type == TaskType::Story)
            .expect("story");
        assert_eq!(OkrRow(story).bar(), ".".repeat(20));
    }

    #[test]
    fn cli_error_from_core_error_carries_code() {
        let err = CsmError::NotFound {
            kind: RecordKind::Task,
            id: 42,
        };
        let cli = CliError::from(&err);
        assert_eq!(cli.message, "task 42 not found");
        assert_eq!(cli.error_code.as_deref(), Some("E2003"));
        assert!(cli.suggestion.is_some());

        let wrapped = anyhow::Error::new(err);
        assert_eq!(CliError::from(&wrapped).error_code.as_deref(), Some("E2003"));
    }

    #[test]
    fn error_rendering_per_mode() {
        let err = CliError::with_details("bad input", "try again", "E2001");
        let human = render_to_string(|w| write_error(OutputMode::Pretty, &err, w));
        assert_eq!(human, "error: bad input\n  suggestion: try again\n");

        let json = render_to_string(|w| write_error(OutputMode::Json, &err, w));
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["error"]["error_code"], "E2001");
    }

    #[test]
    fn write_item_json_ends_with_newline() {
        let task = sample_task();
        let out = render_to_string(|w| write_item(&TaskDetail(&task), OutputMode::Json, w));
        assert!(out.ends_with("}\n"));
    }
}

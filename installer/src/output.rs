//! Output formatting for the installer CLI.
//!
//! Progress lines, caveats and dry-run plans go to stderr; machine-readable
//! reports and the `caveats` subcommand write to stdout.

use camino::Utf8Path;
use keg::caveat::CaveatContext;
use keg::formula::Formula;
use keg::layout::PrefixLayout;
use std::io::Write;

/// Write one line to `stderr`, ignoring failures.
///
/// Progress output is best-effort; a closed stderr must not abort an
/// install that is otherwise succeeding.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Render the formula's caveat against `layout`, if it declares one.
///
/// # Example
///
/// ```
/// use keg::formula::Formula;
/// use keg::layout::PrefixLayout;
/// use keg_installer::output::render_caveats;
///
/// let formula = Formula::from_toml_str(concat!(
///     "name = \"unity3d\"\n",
///     "desc = \"d\"\n",
///     "homepage = \"https://example.com\"\n",
///     "url = \"https://example.com/unity3d\"\n",
///     "version = \"1.0.0\"\n",
///     "sha256 = \"a36765c619a986671da6d8cde08a341d74d64e7989b4ed36a9d24845a73b6950\"\n",
///     "caveats = \"source {zsh_completion}/_unity3d\"\n",
///     "[[install]]\n",
///     "source = \"unity3d\"\n",
///     "destination = \"bin\"\n",
/// ), "inline").expect("valid formula");
///
/// let text = render_caveats(&formula, &PrefixLayout::new("/opt/homebrew"));
/// assert_eq!(
///     text.as_deref(),
///     Some("source /opt/homebrew/share/zsh/site-functions/_unity3d"),
/// );
/// ```
#[must_use]
pub fn render_caveats(formula: &Formula, layout: &PrefixLayout) -> Option<String> {
    let context = CaveatContext {
        layout,
        name: formula.name(),
        version: formula.version(),
    };
    formula
        .caveats()
        .map(|template| template.render(&context).trim_end().to_owned())
}

/// Format rendered caveats under a heading for display.
#[must_use]
pub fn caveats_block(text: &str) -> String {
    format!("==> Caveats\n{text}")
}

/// Format a success message after installation.
#[must_use]
pub fn success_message(formula: &Formula, count: usize, prefix: &Utf8Path) -> String {
    let plural = if count == 1 { "file" } else { "files" };
    format!(
        "Installed {} {} ({count} {plural}) into {prefix}",
        formula.name(),
        formula.version()
    )
}

/// Planned installation shown by `--dry-run`.
///
/// # Example
///
/// ```
/// use camino::Utf8PathBuf;
/// use keg_installer::output::DryRunInfo;
///
/// let prefix = Utf8PathBuf::from("/opt/keg");
/// let destinations = vec![Utf8PathBuf::from("/opt/keg/bin/unity3d")];
/// let info = DryRunInfo {
///     name: "unity3d",
///     version: "1.0.0",
///     desc: "CLI tool for launching Unity projects",
///     homepage: "https://github.com/Arikaton/homebrew-unity3d",
///     url: "https://example.com/unity3d-1.0.0.tar.gz",
///     sha256: "a36765c619a986671da6d8cde08a341d74d64e7989b4ed36a9d24845a73b6950",
///     payload: "tar.gz",
///     prefix: &prefix,
///     destinations: &destinations,
///     skip_test: false,
///     smoke_test: Some("/opt/keg/bin/unity3d -h".to_owned()),
/// };
///
/// let output = info.display_text();
/// assert!(output.contains("Dry run"));
/// assert!(output.contains("/opt/keg/bin/unity3d"));
/// ```
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// Package name.
    pub name: &'a str,
    /// Package version.
    pub version: &'a str,
    /// One-line package description.
    pub desc: &'a str,
    /// Project homepage.
    pub homepage: &'a str,
    /// Source URL.
    pub url: &'a str,
    /// Declared SHA-256 digest.
    pub sha256: &'a str,
    /// Payload kind name.
    pub payload: &'a str,
    /// Resolved installation prefix.
    pub prefix: &'a Utf8Path,
    /// Every destination path that would be written.
    pub destinations: &'a [camino::Utf8PathBuf],
    /// Whether the smoke test is disabled.
    pub skip_test: bool,
    /// The smoke test command line, if the formula has one.
    pub smoke_test: Option<String>,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Formula: {} {}", self.name, self.version),
            format!("  {}", self.desc),
            format!("Homepage: {}", self.homepage),
            format!("Source: {}", self.url),
            format!("SHA-256: {}", self.sha256),
            format!("Payload: {}", self.payload),
            format!("Prefix: {}", self.prefix),
            String::new(),
            "Files to install:".to_owned(),
        ];
        lines.extend(self.destinations.iter().map(|path| format!("  - {path}")));

        lines.push(String::new());
        let smoke = match (&self.smoke_test, self.skip_test) {
            (_, true) => "skipped".to_owned(),
            (Some(command), false) => command.clone(),
            (None, false) => "none (no executable installed)".to_owned(),
        };
        lines.push(format!("Smoke test: {smoke}"));

        lines.join("\n")
    }
}

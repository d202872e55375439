use super::Host;
use crate::Result;
use crate::mining::classifier::extract_glossary_terms;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ohno::{IntoAppError, app_err};
use std::fs;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct GlossaryArgs {
    /// Saved HTML page of the ML glossary
    #[arg(value_name = "HTML")]
    pub input: Utf8PathBuf,

    /// Keyword list to write; a `.csv` path gets a `keyword` header row
    #[arg(long, short = 'o', value_name = "PATH", default_value = "google_ml_glossary/Keyword_list.csv")]
    pub output: Utf8PathBuf,
}

/// Extract the glossary's headings into a keyword list, one per line.
pub fn extract_glossary<H: Host>(host: &mut H, args: &GlossaryArgs) -> Result<()> {
    let html = fs::read(&args.input).into_app_err_with(|| format!("reading glossary page '{}'", args.input))?;
    let terms = extract_glossary_terms(&String::from_utf8_lossy(&html));

    write_keywords(&args.output, &terms)?;
    let _ = writeln!(host.output(), "wrote {} keyword(s) to {}", terms.len(), args.output);
    Ok(())
}

fn write_keywords(path: &Utf8Path, terms: &[String]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_str().is_empty()) {
        fs::create_dir_all(dir).into_app_err_with(|| format!("creating directory '{dir}'"))?;
    }

    let is_csv = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let text = if is_csv {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["keyword"]).into_app_err("encoding keyword list")?;
        for term in terms {
            writer.write_record([term]).into_app_err("encoding keyword list")?;
        }
        writer.into_inner().map_err(|e| app_err!("encoding keyword list: {}", e.error()))?
    } else {
        terms.iter().map(|term| format!("{term}\n")).collect::<String>().into_bytes()
    };

    fs::write(path, text).into_app_err_with(|| format!("writing keyword list '{path}'"))
}

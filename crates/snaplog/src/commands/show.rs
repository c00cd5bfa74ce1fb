//! `snaplog show`: print sessions from a log file.

use snaplog_core::{LogSection, read_log};

use crate::cli::{GlobalOpts, ShowArgs};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ShowArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = args.file.display().to_string();
    let sections = read_log(&args.file)?;
    let count = sections.len();
    if count == 0 {
        return Err(CliError::EmptyLog { path });
    }

    let mut numbered = sections.into_iter().enumerate().map(|(i, s)| (i + 1, s));
    let mut selected: Vec<(usize, LogSection)> = if args.all {
        numbered.collect()
    } else {
        let index = args.session.unwrap_or(count);
        let section = index
            .checked_sub(1)
            .and_then(|i| numbered.nth(i))
            .ok_or(CliError::SessionNotFound { path, index, count })?;
        vec![section]
    };

    if let Some(tail) = args.tail {
        for (_, section) in &mut selected {
            let skip = section.rows.len().saturating_sub(tail);
            section.rows.drain(..skip);
        }
    }

    let color = output::should_color(&global.color);
    let rendered = output::render_sections(&global.output, &selected, color)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

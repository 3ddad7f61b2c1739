use crate::error::{AppError, AppResult};

/// Reads an indented outline into `(name, parent name)` pairs, parents first.
///
/// ```text
/// food
///     meat
///         raw meat
///     sweets
/// books
/// ```
///
/// yields `food/None, meat/food, raw meat/meat, sweets/food, books/None`.
/// Blank lines are skipped. Dedenting to a width that was never opened is an
/// error naming the offending line, counted over non-blank lines from zero.
pub fn read_outline<I, S>(lines: I) -> AppResult<Vec<(String, Option<String>)>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    // Open levels: (name owning the level, indent of that name).
    let mut levels: Vec<(Option<String>, isize)> = Vec::new();
    let mut last_name: Option<String> = None;
    let mut last_indent: isize = -1;
    let mut result = Vec::new();

    let entries = lines.into_iter().filter_map(|line| {
        let line = line.as_ref();
        let name = line.trim();
        if name.is_empty() {
            None
        } else {
            let indent = (line.len() - line.trim_start().len()) as isize;
            Some((indent, name.to_string()))
        }
    });

    for (index, (indent, name)) in entries.enumerate() {
        if indent > last_indent {
            levels.push((last_name.take(), last_indent));
        } else if indent < last_indent {
            while indent < last_indent {
                match levels.pop() {
                    Some((_, level_indent)) => last_indent = level_indent,
                    None => break,
                }
            }
            if indent != last_indent {
                return Err(AppError::Validation(format!(
                    "unindent does not match any outer indentation level in line {}",
                    index
                )));
            }
        }

        let parent = levels.last().and_then(|(owner, _)| owner.clone());
        result.push((name.clone(), parent));
        last_name = Some(name);
        last_indent = indent;
    }

    Ok(result)
}

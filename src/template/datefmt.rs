//! Custom date patterns in the `yyyy-MM-dd HH:mm` style.
//!
//! Pattern letters repeat to pick a width (`M` → `3`, `MM` → `03`,
//! `MMM` → `Mar`, `MMMM` → `March`). Text in single or double quotes and
//! characters after `\` are copied verbatim; a leading `%` is dropped so a
//! one-letter pattern like `%d` can be written. Letters outside the table
//! are literal.

use chrono::{DateTime, Datelike, Offset, TimeZone, Timelike};

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const WEEKDAYS: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

/// Renders `at` using a custom date pattern.
#[must_use]
pub fn format_date<Tz: TimeZone>(at: &DateTime<Tz>, pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let end = chars[i + 1..].iter().position(|q| *q == c).map_or(chars.len(), |p| i + 1 + p);
                out.extend(&chars[i + 1..end]);
                i = end + 1;
                continue;
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
                continue;
            }
            '%' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let run = chars[i..].iter().take_while(|x| **x == c).count();
        match render_token(at, c, run) {
            Some(text) => out.push_str(&text),
            None => out.push_str(&c.to_string().repeat(run)),
        }
        i += run;
    }
    out
}

fn render_token<Tz: TimeZone>(at: &DateTime<Tz>, letter: char, run: usize) -> Option<String> {
    let text = match letter {
        'y' => match run {
            1 => (at.year() % 100).to_string(),
            2 => format!("{:02}", at.year() % 100),
            n => format!("{:0n$}", at.year()),
        },
        'M' => {
            let name = MONTHS[at.month0() as usize];
            match run {
                1 => at.month().to_string(),
                2 => format!("{:02}", at.month()),
                3 => name[..3].to_string(),
                _ => name.to_string(),
            }
        }
        'd' => {
            let name = WEEKDAYS[at.weekday().num_days_from_monday() as usize];
            match run {
                1 => at.day().to_string(),
                2 => format!("{:02}", at.day()),
                3 => name[..3].to_string(),
                _ => name.to_string(),
            }
        }
        'H' => pad(at.hour(), run),
        'h' => pad(at.hour12().1, run),
        'm' => pad(at.minute(), run),
        's' => pad(at.second(), run),
        'f' | 'F' => {
            let digits = run.min(9);
            let scaled = at.nanosecond() % 1_000_000_000 / 10u32.pow(9 - u32::try_from(digits).unwrap_or(9));
            let text = format!("{scaled:0digits$}");
            if letter == 'F' {
                text.trim_end_matches('0').to_string()
            } else {
                text
            }
        }
        't' => {
            let marker = if at.hour12().0 { "PM" } else { "AM" };
            if run == 1 { marker[..1].to_string() } else { marker.to_string() }
        }
        'z' => {
            let seconds = at.offset().fix().local_minus_utc();
            let sign = if seconds < 0 { '-' } else { '+' };
            let hours = seconds.abs() / 3600;
            let minutes = seconds.abs() % 3600 / 60;
            match run {
                1 => format!("{sign}{hours}"),
                2 => format!("{sign}{hours:02}"),
                _ => format!("{sign}{hours:02}:{minutes:02}"),
            }
        }
        _ => return None,
    };
    Some(text)
}

fn pad(value: u32, run: usize) -> String {
    if run == 1 { value.to_string() } else { format!("{value:02}") }
}

/*
 *  gui.rs: The terminal interface for dwipe.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode},
    execute,
    style::{self, Color, Print},
    terminal::{self, ClearType},
};

use crate::context::{SelectStatus, WipeContext};
use crate::logging::{hours_minutes_seconds, recent_lines};
use crate::options::{WipeOptions, KNOB_SLEEP};
use crate::version::BANNER;

// Spinner characters for devices that are busy.
const SPINNER_CHARS: [char; 4] = ['|', '/', '-', '\\'];

static SPINNER_IDX: AtomicUsize = AtomicUsize::new(0);

/// Initialize the terminal interface.
pub fn gui_init() -> io::Result<()> {
    terminal::enable_raw_mode()?;
    execute!(
        io::stdout(),
        terminal::EnterAlternateScreen,
        cursor::Hide,
        terminal::Clear(ClearType::All)
    )?;
    draw_header()?;
    Ok(())
}

/// Release the terminal interface.
pub fn gui_free() {
    let _ = execute!(
        io::stdout(),
        terminal::LeaveAlternateScreen,
        cursor::Show,
        style::ResetColor
    );
    let _ = terminal::disable_raw_mode();
}

fn draw_header() -> io::Result<()> {
    let (width, _) = terminal::size()?;
    let header = format!("{:^width$}", BANNER, width = width as usize);
    execute!(
        io::stdout(),
        cursor::MoveTo(0, 0),
        style::SetForegroundColor(Color::White),
        style::SetBackgroundColor(Color::Blue),
        Print(header),
        style::ResetColor
    )
}

fn draw_footer(text: &str) -> io::Result<()> {
    let (width, height) = terminal::size()?;
    let footer = format!("{:^width$}", text, width = width as usize);
    execute!(
        io::stdout(),
        cursor::MoveTo(0, height.saturating_sub(1)),
        style::SetForegroundColor(Color::White),
        style::SetBackgroundColor(Color::Blue),
        Print(footer),
        style::ResetColor
    )
}

fn select_mark(select: SelectStatus) -> &'static str {
    match select {
        SelectStatus::True => "[wipe]",
        SelectStatus::TrueParent => "[****]",
        SelectStatus::False => "[    ]",
        SelectStatus::FalseChild => "[----]",
        SelectStatus::Disabled => "[!!!!]",
    }
}

fn throughput_label(bytes_per_second: u64) -> String {
    if bytes_per_second >= 1_000_000 {
        format!("{} MB/s", bytes_per_second / 1_000_000)
    } else if bytes_per_second >= 1_000 {
        format!("{} kB/s", bytes_per_second / 1_000)
    } else {
        format!("{} B/s", bytes_per_second)
    }
}

/// Show the working options before an autonuke run. Any key starts the wipe.
pub fn gui_options(options: &WipeOptions) -> io::Result<()> {
    execute!(io::stdout(), terminal::Clear(ClearType::All))?;
    draw_header()?;

    let lines = [
        String::from("Options"),
        String::from("-------"),
        format!(" Method: {}", options.method.label()),
        format!(" PRNG:   {}", options.prng.label()),
        format!(" Rounds: {}", options.rounds),
        format!(" Verify: {}", options.verify.label()),
    ];
    for (i, line) in lines.iter().enumerate() {
        execute!(
            io::stdout(),
            cursor::MoveTo(1, 2 + i as u16),
            Print(line)
        )?;
    }

    draw_footer("Press any key to start wiping...")?;
    io::stdout().flush()?;
    wait_key();
    Ok(())
}

/// Interactive device selection. Returns false when the user aborted.
pub fn gui_select(contexts: &[Arc<WipeContext>]) -> io::Result<bool> {
    let mut cursor_pos: usize = 0;

    loop {
        execute!(io::stdout(), terminal::Clear(ClearType::All))?;
        draw_header()?;
        execute!(
            io::stdout(),
            cursor::MoveTo(1, 2),
            Print("Select the devices to wipe:")
        )?;

        for (i, context) in contexts.iter().enumerate() {
            let marker = if i == cursor_pos { ">" } else { " " };
            let line = format!("{} {} {}", marker, select_mark(context.select()), context.label);
            execute!(io::stdout(), cursor::MoveTo(1, 4 + i as u16), Print(line))?;
        }

        draw_footer("Up/Down move, Space select, Enter start, Esc abort")?;
        io::stdout().flush()?;

        match event::read()? {
            Event::Key(key) => match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    cursor_pos = cursor_pos.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if cursor_pos + 1 < contexts.len() {
                        cursor_pos += 1;
                    }
                }
                KeyCode::Char(' ') => {
                    toggle_selection(contexts, cursor_pos);
                }
                KeyCode::Enter => {
                    if contexts.iter().any(|c| c.select() == SelectStatus::True) {
                        return Ok(true);
                    }
                }
                KeyCode::Esc | KeyCode::Char('q') => {
                    return Ok(false);
                }
                _ => {}
            },
            _ => {}
        }

        if crate::engine::terminate_requested() {
            return Ok(false);
        }
    }
}

/// Flip one device's selection, keeping parents and partitions coherent:
/// selecting a whole disk implies its partitions, selecting a partition
/// blocks its parent disk.
fn toggle_selection(contexts: &[Arc<WipeContext>], index: usize) {
    let target = &contexts[index];

    let is_child_of = |child: &WipeContext, parent: &WipeContext| {
        child.device_name != parent.device_name
            && child.device_name.starts_with(&parent.device_name)
    };

    match target.select() {
        SelectStatus::Disabled | SelectStatus::TrueParent | SelectStatus::FalseChild => {}
        SelectStatus::False => {
            target.set_select(SelectStatus::True);
            for other in contexts {
                if is_child_of(other, target) && other.select() == SelectStatus::False {
                    other.set_select(SelectStatus::TrueParent);
                }
                if is_child_of(target, other) && other.select() == SelectStatus::False {
                    other.set_select(SelectStatus::FalseChild);
                }
            }
        }
        SelectStatus::True => {
            target.set_select(SelectStatus::False);
            for other in contexts {
                if is_child_of(other, target) && other.select() == SelectStatus::TrueParent {
                    other.set_select(SelectStatus::False);
                }
                if is_child_of(target, other) && other.select() == SelectStatus::FalseChild {
                    let still_blocked = contexts.iter().any(|c| {
                        is_child_of(c, other) && c.select() == SelectStatus::True
                    });
                    if !still_blocked {
                        other.set_select(SelectStatus::False);
                    }
                }
            }
        }
    }
}

/// Draw one frame of the status screen.
pub fn gui_status(contexts: &[Arc<WipeContext>]) -> io::Result<()> {
    let spinner_idx = SPINNER_IDX.fetch_add(1, Ordering::Relaxed);
    let (_, height) = terminal::size()?;

    execute!(io::stdout(), terminal::Clear(ClearType::All))?;
    draw_header()?;

    let mut row: u16 = 2;
    for context in contexts {
        if context.select() != SelectStatus::True {
            continue;
        }

        let spinner = if context.wipe_status.load(Ordering::Relaxed) == 1 {
            SPINNER_CHARS[spinner_idx % SPINNER_CHARS.len()]
        } else {
            ' '
        };

        let state = if context.sync_status.load(Ordering::Relaxed) {
            "syncing".to_string()
        } else {
            match context.wipe_status.load(Ordering::Relaxed) {
                -1 => "waiting".to_string(),
                1 => context.pass_type().tag().to_string(),
                _ => match context.result.load(Ordering::Relaxed) {
                    0 => "done".to_string(),
                    r if r > 0 => "errors".to_string(),
                    _ => "failed".to_string(),
                },
            }
        };

        let (h, m, s) = hours_minutes_seconds(context.eta.load(Ordering::Relaxed));
        let line1 = format!("{} {}", spinner, context.label);
        let line2 = format!(
            "    round {}/{}, pass {}/{} [{}] {:6.2}%  {}  eta {:02}:{:02}:{:02}  errors {}",
            context.round_working.load(Ordering::Relaxed),
            context.round_count.load(Ordering::Relaxed),
            context.pass_working.load(Ordering::Relaxed),
            context.pass_count.load(Ordering::Relaxed),
            state,
            context.round_percent(),
            throughput_label(context.throughput.load(Ordering::Relaxed)),
            h,
            m,
            s,
            context.round_errors.load(Ordering::Relaxed)
                + context.verify_errors.load(Ordering::Relaxed),
        );

        execute!(io::stdout(), cursor::MoveTo(1, row), Print(line1))?;
        execute!(io::stdout(), cursor::MoveTo(1, row + 1), Print(line2))?;
        row += 3;

        if row + 2 >= height {
            break;
        }
    }

    // Trailing log lines below the device table.
    let log_rows = height.saturating_sub(row + 2).min(8);
    for (i, line) in recent_lines(log_rows as usize).iter().enumerate() {
        execute!(
            io::stdout(),
            cursor::MoveTo(1, row + 1 + i as u16),
            style::SetForegroundColor(Color::DarkGrey),
            Print(line),
            style::ResetColor
        )?;
    }

    draw_footer("Wipe in progress")?;
    io::stdout().flush()
}

/// The supervisor tick with the interface active: redraw, then block on the
/// keyboard for up to a second so input and progress share the same pacing.
pub fn gui_status_tick(contexts: &[Arc<WipeContext>]) {
    let _ = gui_status(contexts);
    if let Ok(true) = event::poll(Duration::from_secs(KNOB_SLEEP)) {
        let _ = event::read();
    }
}

/// Draw the final frame once all workers have returned.
pub fn gui_finish(contexts: &[Arc<WipeContext>]) -> io::Result<()> {
    gui_status(contexts)?;
    draw_footer("Wipe finished. Press any key.")?;
    io::stdout().flush()
}

/// Block until any key is pressed.
pub fn wait_key() {
    loop {
        if crate::engine::terminate_requested() {
            return;
        }
        if let Ok(true) = event::poll(Duration::from_secs(KNOB_SLEEP)) {
            if let Ok(Event::Key(_)) = event::read() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(name: &str) -> Arc<WipeContext> {
        Arc::new(WipeContext::new(name))
    }

    #[test]
    fn selecting_a_disk_implies_its_partitions() {
        let contexts = vec![ctx("/dev/sda"), ctx("/dev/sda1"), ctx("/dev/sdb")];

        toggle_selection(&contexts, 0);
        assert_eq!(contexts[0].select(), SelectStatus::True);
        assert_eq!(contexts[1].select(), SelectStatus::TrueParent);
        assert_eq!(contexts[2].select(), SelectStatus::False);

        toggle_selection(&contexts, 0);
        assert_eq!(contexts[0].select(), SelectStatus::False);
        assert_eq!(contexts[1].select(), SelectStatus::False);
    }

    #[test]
    fn selecting_a_partition_blocks_the_parent_disk() {
        let contexts = vec![ctx("/dev/sda"), ctx("/dev/sda1"), ctx("/dev/sda2")];

        toggle_selection(&contexts, 1);
        assert_eq!(contexts[0].select(), SelectStatus::FalseChild);
        assert_eq!(contexts[1].select(), SelectStatus::True);

        // Deselecting the only selected partition releases the parent.
        toggle_selection(&contexts, 1);
        assert_eq!(contexts[0].select(), SelectStatus::False);
        assert_eq!(contexts[1].select(), SelectStatus::False);
    }

    #[test]
    fn disabled_devices_cannot_be_toggled() {
        let contexts = vec![ctx("/dev/sda")];
        contexts[0].set_select(SelectStatus::Disabled);
        toggle_selection(&contexts, 0);
        assert_eq!(contexts[0].select(), SelectStatus::Disabled);
    }

    #[test]
    fn throughput_labels_scale() {
        assert_eq!(throughput_label(512), "512 B/s");
        assert_eq!(throughput_label(2_048), "2 kB/s");
        assert_eq!(throughput_label(83_886_080), "83 MB/s");
    }
}

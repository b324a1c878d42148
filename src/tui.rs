use std::io;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row as TableRow, Table};

use crate::app::QueryResult;
use crate::filter::{ChoiceRank, classify_choice};
use crate::records::COL_CONSIDERATION;

enum DisplayLine {
    Record {
        cells: Vec<String>,
        rank: Option<ChoiceRank>,
    },
    Separator,
}

/// Scrollable table of the retained groups.
///
/// Row tinting goes through `classify_choice`, which resolves text naming
/// several ranks to the highest one; a row can only carry one background.
pub fn show_results(result: &QueryResult) -> miette::Result<()> {
    let lines = flatten(result);

    let mut stdout = io::stdout();
    enable_raw_mode().into_diagnostic()?;
    stdout.execute(EnterAlternateScreen).into_diagnostic()?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).into_diagnostic()?;
    terminal.clear().into_diagnostic()?;

    let outcome = run_loop(&mut terminal, result, &lines);

    disable_raw_mode().into_diagnostic()?;
    io::stdout()
        .execute(LeaveAlternateScreen)
        .into_diagnostic()?;

    outcome
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    result: &QueryResult,
    lines: &[DisplayLine],
) -> miette::Result<()> {
    let mut offset = 0usize;
    let mut page = 1usize;

    loop {
        terminal
            .draw(|frame| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(3), Constraint::Length(1)])
                    .split(frame.area());

                page = chunks[0].height.saturating_sub(3).max(1) as usize;
                let max_offset = lines.len().saturating_sub(page);
                offset = offset.min(max_offset);

                let columns = result.columns.columns();
                let widths: Vec<Constraint> = columns
                    .iter()
                    .map(|_| Constraint::Ratio(1, columns.len().max(1) as u32))
                    .collect();

                let header = TableRow::new(
                    columns
                        .iter()
                        .map(|name| Cell::from(name.clone()))
                        .collect::<Vec<_>>(),
                )
                .style(Style::default().fg(Color::Cyan));

                let body: Vec<TableRow> = lines
                    .iter()
                    .skip(offset)
                    .take(page)
                    .map(|line| match line {
                        DisplayLine::Record { cells, rank } => {
                            let row = TableRow::new(
                                cells.iter().map(|cell| Cell::from(cell.clone())).collect::<Vec<_>>(),
                            );
                            match rank {
                                Some(rank) => row.style(rank_style(*rank)),
                                None => row,
                            }
                        }
                        DisplayLine::Separator => TableRow::new(Vec::<Cell>::new()),
                    })
                    .collect();

                let table = Table::new(body, widths).header(header).block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(" Strutture Sci — Analisi Dati "),
                );
                frame.render_widget(table, chunks[0]);

                let status = Paragraph::new(format!(
                    " Record trovati: {} | Record totali: {} | ↑/↓ PgUp/PgDn scorri, q esci",
                    result.filtered_count, result.total_count
                ))
                .style(Style::default().fg(Color::DarkGray));
                frame.render_widget(status, chunks[1]);
            })
            .into_diagnostic()?;

        if !event::poll(Duration::from_millis(200)).into_diagnostic()? {
            continue;
        }
        if let Event::Key(key) = event::read().into_diagnostic()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Up => offset = offset.saturating_sub(1),
                KeyCode::Down => offset = offset.saturating_add(1),
                KeyCode::PageUp => offset = offset.saturating_sub(page),
                KeyCode::PageDown => offset = offset.saturating_add(page),
                KeyCode::Home => offset = 0,
                KeyCode::End => offset = lines.len(),
                _ => {}
            }
        }
    }

    Ok(())
}

fn flatten(result: &QueryResult) -> Vec<DisplayLine> {
    let mut lines = Vec::new();
    for (index, group) in result.groups.iter().enumerate() {
        if index > 0 {
            lines.push(DisplayLine::Separator);
        }
        for row in group.rows() {
            let rank = classify_choice(result.columns.value(row, COL_CONSIDERATION));
            lines.push(DisplayLine::Record {
                cells: row.cells().to_vec(),
                rank,
            });
        }
    }
    lines
}

fn rank_style(rank: ChoiceRank) -> Style {
    let bg = match rank {
        ChoiceRank::First => Color::Rgb(200, 255, 200),
        ChoiceRank::Second => Color::Rgb(255, 255, 150),
        ChoiceRank::Third => Color::Rgb(255, 200, 150),
    };
    Style::default().bg(bg).fg(Color::Black)
}

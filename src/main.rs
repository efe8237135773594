use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

mod app;
mod config;
mod logging;
mod modules;
mod ui;

use app::{App, AppState, MenuSection};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init(&config)?;
    tracing::info!(config = ?config.path, data_dir = ?config.data_dir, "configuration loaded");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&config);
    let res = run_app(&mut terminal, &mut app);
    app.shutdown();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!("{:?}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()> {
    loop {
        if app.tick() {
            terminal.draw(|f| ui::draw(f, app))?;
        }

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        match event::read()? {
            Event::Resize(_, _) => app.mark_dirty(),
            Event::Key(KeyEvent { code, modifiers, kind, .. }) => {
                if kind != KeyEventKind::Press {
                    continue;
                }
                app.mark_dirty();
                match app.state {
                    AppState::Normal => match code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        KeyCode::Char('?') => app.show_help = !app.show_help,
                        KeyCode::Char('1') => app.set_section(MenuSection::Dashboard),
                        KeyCode::Char('2') => app.set_section(MenuSection::Notifications),
                        KeyCode::Char('3') => app.set_section(MenuSection::LeaveRequests),
                        KeyCode::Up | KeyCode::Char('k') => app.previous_item(),
                        KeyCode::Down | KeyCode::Char('j') => app.next_item(),
                        KeyCode::PageUp => app.page_up(),
                        KeyCode::PageDown => app.page_down(),
                        KeyCode::Home => app.go_home(),
                        KeyCode::End => app.go_end(),
                        KeyCode::Enter => app.activate_item(),
                        KeyCode::Char('a') => app.mark_all_read(),
                        KeyCode::Char('C') => app.request_clear_all(),
                        KeyCode::Char('n') => app.new_item(),
                        KeyCode::Char('t') => app.toggle_detail(),
                        KeyCode::Tab => app.next_section(),
                        KeyCode::BackTab => app.previous_section(),
                        KeyCode::Esc => app.show_help = false,
                        _ => {}
                    },
                    AppState::Input => match code {
                        KeyCode::Enter => app.submit_input(),
                        KeyCode::Esc => app.cancel_input(),
                        KeyCode::Backspace => app.input_backspace(),
                        KeyCode::Char(c) => app.input_char(c),
                        KeyCode::Left => app.input_move_left(),
                        KeyCode::Right => app.input_move_right(),
                        _ => {}
                    },
                    AppState::Confirm => match code {
                        KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_action(),
                        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                            app.cancel_confirm()
                        }
                        _ => {}
                    },
                }
            }
            _ => {}
        }
    }
}

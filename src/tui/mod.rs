mod input;
mod layout;
mod packages;
mod state;
mod theme;

use crate::package_manager::{Action, CommandRunner, PackageService, ServiceEvent};
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use state::App;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

type Term = Terminal<CrosstermBackend<io::Stdout>>;

pub async fn run<R: CommandRunner>(service: PackageService<R>) -> Result<()> {
    // 终端初始化
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &service).await;

    // 终止仍在运行的 winget / cleanmgr 子进程
    service.cancel();

    // 恢复终端
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn event_loop<R: CommandRunner>(terminal: &mut Term, service: &PackageService<R>) -> Result<()> {
    let mut app = App::new();
    let (tx, mut rx) = mpsc::channel(64);

    dispatch(service, &tx, Action::CheckWinget);
    dispatch(
        service,
        &tx,
        Action::Refresh {
            upgrade_only: app.upgrade_only,
        },
    );

    loop {
        terminal.draw(|f| packages::render(f, &app))?;

        // 处理按键
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    // 翻页步长：列表区高度（去掉 header/status/footer/边框/筛选/统计）
                    let page = terminal.size()?.height.saturating_sub(11) as usize;
                    if let Some(action) = packages::handle_key(key, &mut app, page) {
                        dispatch(service, &tx, action);
                    }
                }
            }
        }

        // 处理服务事件
        while let Ok(event) = rx.try_recv() {
            app.apply_event(event);
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// 在后台任务中执行操作，事件回到主循环
fn dispatch<R: CommandRunner>(
    service: &PackageService<R>,
    tx: &mpsc::Sender<ServiceEvent>,
    action: Action,
) {
    log::info!("dispatch {:?}", action);
    let service = service.clone();
    let tx = tx.clone();
    tokio::spawn(async move { service.perform(action, &tx).await });
}

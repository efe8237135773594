use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::modules::{
    identity::Identity,
    leave::LeaveRequestsModule,
    notifications::{ListenerId, Notification, NotificationStore, StoreOptions},
    storage::{FileStorage, MemoryStorage, Storage},
    toast::ToastDispatcher,
};

/// How many notifications the dashboard previews.
pub const DASHBOARD_RECENT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuSection {
    Dashboard,
    Notifications,
    LeaveRequests,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Normal,
    Input,
    Confirm,
}

pub struct App {
    pub current_section: MenuSection,
    pub state: AppState,
    pub selected_index: usize,
    pub input_buffer: String,
    pub input_cursor: usize,
    pub input_prompt: String,
    pub confirm_message: String,
    pub status_message: String,
    pub show_detail: bool,
    pub show_help: bool,

    pub identity: Identity,
    pub notifications: NotificationStore,
    pub leave_module: LeaveRequestsModule,
    pub toasts: ToastDispatcher,

    // Set by the store's change listener, cleared when a frame is drawn.
    dirty: Arc<AtomicBool>,
    change_listener: ListenerId,
    last_tick: Instant,
    // Status line as of the previous tick; a difference means a key handler set it.
    tick_status: String,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let storage: Box<dyn Storage> = match FileStorage::open(&config.data_dir) {
            Ok(storage) => Box::new(storage),
            Err(e) => {
                warn!(error = %e, dir = ?config.data_dir, "data directory unusable, notifications will not persist");
                Box::new(MemoryStorage::new())
            }
        };
        let identity = Identity::resolve(config);
        Self::from_parts(config, storage, identity)
    }

    pub fn from_parts(config: &Config, storage: Box<dyn Storage>, identity: Identity) -> Self {
        let mut notifications = NotificationStore::open(
            storage,
            StoreOptions {
                retention: config.retention_limit,
                seed_samples: config.seed_samples,
            },
        );
        let toasts = ToastDispatcher::new();
        notifications.attach_toasts(&toasts);

        let dirty = Arc::new(AtomicBool::new(true));
        let change_listener = {
            let dirty = Arc::clone(&dirty);
            notifications.on_change(move |_| dirty.store(true, Ordering::SeqCst))
        };

        let leave_module = LeaveRequestsModule::new(
            toasts.clone(),
            Duration::from_millis(config.leave_confirm_delay_ms),
        );
        info!(
            user = %identity.username,
            notifications = notifications.len(),
            unread = notifications.unread_count(),
            "session started"
        );

        Self {
            current_section: MenuSection::Dashboard,
            state: AppState::Normal,
            selected_index: 0,
            input_buffer: String::new(),
            input_cursor: 0,
            input_prompt: String::new(),
            confirm_message: String::new(),
            status_message: String::from("Welcome to Absentra! Press '?' for help"),
            show_detail: true,
            show_help: false,
            identity,
            notifications,
            leave_module,
            toasts,
            dirty,
            change_listener,
            tick_status: String::new(),
            last_tick: Instant::now(),
        }
    }

    /// Releases the toast subscription and change listener.
    pub fn shutdown(&mut self) {
        self.notifications.detach_toasts();
        self.notifications.remove_listener(self.change_listener);
        info!(
            toast_subscribers = self.toasts.subscriber_count(),
            unread = self.notifications.unread_count(),
            "session ended"
        );
    }

    /// Pulls in pending toasts and reports whether the screen needs redrawing.
    pub fn tick(&mut self) -> bool {
        let drained = self.notifications.drain_toasts();
        if drained > 0 {
            let count = format!(
                "{} new notification{}",
                drained,
                if drained == 1 { "" } else { "s" }
            );
            self.status_message = if self.status_message != self.tick_status {
                format!("{} ({})", self.status_message, count)
            } else {
                count
            };
        }
        self.tick_status.clone_from(&self.status_message);
        self.clamp_selection();

        let changed = self.dirty.swap(false, Ordering::SeqCst);
        let clock_due = self.last_tick.elapsed() >= Duration::from_secs(1);
        if clock_due {
            self.last_tick = Instant::now();
        }
        changed || clock_due
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn recent_notifications(&self) -> &[Notification] {
        let list = self.notifications.notifications();
        &list[..list.len().min(DASHBOARD_RECENT)]
    }

    pub fn selected_notification(&self) -> Option<&Notification> {
        match self.current_section {
            MenuSection::Dashboard => self.recent_notifications().get(self.selected_index),
            MenuSection::Notifications => self.notifications.notifications().get(self.selected_index),
            MenuSection::LeaveRequests => None,
        }
    }

    pub fn next_item(&mut self) {
        let max = self.get_current_list_len();
        if max > 0 {
            self.selected_index = (self.selected_index + 1) % max;
        }
    }

    pub fn previous_item(&mut self) {
        let max = self.get_current_list_len();
        if max > 0 {
            self.selected_index = if self.selected_index == 0 {
                max - 1
            } else {
                self.selected_index - 1
            };
        }
    }

    pub fn page_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(10);
    }

    pub fn page_down(&mut self) {
        let len = self.get_current_list_len();
        if len == 0 {
            return;
        }
        self.selected_index = usize::min(self.selected_index.saturating_add(10), len - 1);
    }

    pub fn go_home(&mut self) {
        self.selected_index = 0;
    }

    pub fn go_end(&mut self) {
        self.selected_index = self.get_current_list_len().saturating_sub(1);
    }

    pub fn set_section(&mut self, section: MenuSection) {
        if self.current_section != section {
            self.current_section = section;
            self.selected_index = 0;
        }
    }

    pub fn next_section(&mut self) {
        self.set_section(match self.current_section {
            MenuSection::Dashboard => MenuSection::Notifications,
            MenuSection::Notifications => MenuSection::LeaveRequests,
            MenuSection::LeaveRequests => MenuSection::Dashboard,
        });
    }

    pub fn previous_section(&mut self) {
        self.set_section(match self.current_section {
            MenuSection::Dashboard => MenuSection::LeaveRequests,
            MenuSection::Notifications => MenuSection::Dashboard,
            MenuSection::LeaveRequests => MenuSection::Notifications,
        });
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    /// Enter: marks the highlighted notification as read.
    pub fn activate_item(&mut self) {
        let Some(id) = self.selected_notification().map(|n| n.id.clone()) else {
            return;
        };
        if self.notifications.mark_read(&id) {
            self.status_message = format!("Marked as read ({} unread)", self.notifications.unread_count());
        }
    }

    pub fn mark_all_read(&mut self) {
        let changed = self.notifications.mark_all_read();
        self.status_message = if changed == 0 {
            "No unread notifications".to_string()
        } else {
            format!("Marked {} notification{} as read", changed, if changed == 1 { "" } else { "s" })
        };
    }

    pub fn request_clear_all(&mut self) {
        if self.notifications.is_empty() {
            self.status_message = "Nothing to clear".to_string();
            return;
        }
        self.state = AppState::Confirm;
        self.confirm_message = format!("Clear all {} notifications? (y/n)", self.notifications.len());
    }

    pub fn confirm_action(&mut self) {
        self.notifications.clear_all();
        self.selected_index = 0;
        self.status_message = "Notifications cleared".to_string();
        self.cancel_confirm();
    }

    pub fn cancel_confirm(&mut self) {
        self.state = AppState::Normal;
        self.confirm_message.clear();
    }

    /// Opens the leave-request form.
    pub fn new_item(&mut self) {
        self.state = AppState::Input;
        self.input_buffer.clear();
        self.input_cursor = 0;
        self.input_prompt = "New leave request (YYYY-MM-DD|YYYY-MM-DD|reason): ".to_string();
    }

    pub fn submit_input(&mut self) {
        let input = self.input_buffer.clone();
        // Both outcomes come back as toasts; only the status line is set here.
        match self.leave_module.submit_from_string(&input) {
            Ok(_) => self.status_message = "Leave request sent".to_string(),
            Err(e) => self.status_message = format!("Leave request failed: {}", e),
        }
        self.cancel_input();
    }

    pub fn cancel_input(&mut self) {
        self.state = AppState::Normal;
        self.input_buffer.clear();
        self.input_cursor = 0;
    }

    pub fn input_char(&mut self, c: char) {
        let at = byte_offset(&self.input_buffer, self.input_cursor);
        self.input_buffer.insert(at, c);
        self.input_cursor += 1;
    }

    pub fn input_backspace(&mut self) {
        if self.input_cursor > 0 {
            let at = byte_offset(&self.input_buffer, self.input_cursor - 1);
            self.input_buffer.remove(at);
            self.input_cursor -= 1;
        }
    }

    pub fn input_move_left(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
        }
    }

    pub fn input_move_right(&mut self) {
        if self.input_cursor < self.input_buffer.chars().count() {
            self.input_cursor += 1;
        }
    }

    fn get_current_list_len(&self) -> usize {
        match self.current_section {
            MenuSection::Dashboard => self.recent_notifications().len(),
            MenuSection::Notifications => self.notifications.len(),
            MenuSection::LeaveRequests => self.leave_module.requests.len(),
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.get_current_list_len();
        if self.selected_index >= len {
            self.selected_index = len.saturating_sub(1);
        }
    }
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

use adw::prelude::*;
use adw::Application;
use gtk4 as gtk;
use log::{error, warn};

use greenchat::storage::FileStore;
use greenchat::{ApiClient, Settings};

/// Everything the windows share.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub client: ApiClient,
    pub store: FileStore,
}

impl AppContext {
    pub fn load() -> Result<Self, String> {
        let mut settings = Settings::load();
        let client = match ApiClient::from_settings(&settings) {
            Ok(client) => client,
            Err(e) => {
                warn!("unusable api_url {:?} ({e}), using the default", settings.api_url);
                settings.api_url = greenchat::config::DEFAULT_API_URL.to_string();
                ApiClient::from_settings(&settings).map_err(|e| e.to_string())?
            }
        };
        let store = FileStore::open_default().map_err(|e| e.to_string())?;
        Ok(Self {
            settings,
            client,
            store,
        })
    }
}

pub fn build_ui(app: &Application) {
    match AppContext::load() {
        Ok(ctx) => crate::ui::login::show_login_window(app, ctx),
        Err(err) => {
            error!("cannot start: {err}");
            show_error_window(app, &err);
        }
    }
}

fn show_error_window(app: &Application, message: &str) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("GreenChat")
        .default_width(420)
        .default_height(260)
        .build();
    let page = adw::StatusPage::builder()
        .icon_name("dialog-error-symbolic")
        .title("Application error")
        .description(message)
        .build();
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    container.append(&adw::HeaderBar::new());
    container.append(&page);
    window.set_content(Some(&container));
    window.present();
}

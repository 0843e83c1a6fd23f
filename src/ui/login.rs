use std::rc::Rc;

use adw::prelude::*;
use adw::Application;
use gtk4 as gtk;
use log::info;
use tokio::sync::mpsc;

use greenchat::{Contact, CredentialStore, Instance, LoginError, LoginFlow, LoginForm, LoginState};

use crate::app::AppContext;
use crate::ui::runtime::{forward_to_main, run_async_to_main};

fn state_label(state: LoginState) -> &'static str {
    match state {
        LoginState::Idle => "",
        LoginState::CheckingInstance => "Checking instance…",
        LoginState::CheckingContact => "Instance authorized, checking phone number…",
        LoginState::Ready => "Logged in, loading chat…",
        LoginState::Failed => "Login failed",
    }
}

pub fn show_login_window(app: &Application, ctx: AppContext) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("GreenChat Login")
        .default_width(420)
        .default_height(320)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Enter your chat login details"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let stored = CredentialStore::open(ctx.store.clone())
        .map(|creds| LoginForm::from_credentials(creds.credentials()))
        .unwrap_or_default();

    let instance_entry = gtk::Entry::new();
    instance_entry.set_placeholder_text(Some("idInstance"));
    instance_entry.set_text(&stored.instance_id);
    instance_entry.set_hexpand(true);

    let token_entry = gtk::PasswordEntry::new();
    token_entry.set_placeholder_text(Some("apiTokenInstance"));
    token_entry.set_show_peek_icon(true);
    token_entry.set_text(&stored.access_token);
    token_entry.set_hexpand(true);

    let phone_entry = gtk::Entry::new();
    phone_entry.set_placeholder_text(Some("Phone number (digits only)"));
    phone_entry.set_input_purpose(gtk::InputPurpose::Digits);
    phone_entry.set_max_length(greenchat::utils::PHONE_DIGITS as i32);
    phone_entry.set_text(&stored.phone);
    phone_entry.set_hexpand(true);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&instance_entry);
    form.append(&token_entry);
    form.append(&phone_entry);
    root.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let login_btn = gtk::Button::with_label("Log in");
    login_btn.add_css_class("suggested-action");
    login_btn.set_halign(gtk::Align::End);
    root.append(&login_btn);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("GreenChat"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let instance_entry = instance_entry.clone();
        let token_entry = token_entry.clone();
        let phone_entry = phone_entry.clone();
        let login_btn = login_btn.clone();
        move || {
            let form = LoginForm {
                instance_id: instance_entry.text().to_string(),
                access_token: token_entry.text().to_string(),
                phone: phone_entry.text().trim().to_string(),
            };
            login_btn.set_sensitive(false);

            let (state_tx, state_rx) = mpsc::unbounded_channel::<LoginState>();
            let status_label = status.clone();
            forward_to_main(state_rx, move |state| status_label.set_label(state_label(state)));

            let ctx_for_async = ctx.clone();
            let login = async move {
                let creds = CredentialStore::open(ctx_for_async.store.clone())?;
                let mut flow = LoginFlow::new(ctx_for_async.client.clone(), creds)
                    .with_observer(move |state| {
                        let _ = state_tx.send(state);
                    });
                let contact = flow.submit(&form).await?;
                Ok::<(Contact, Instance), LoginError>((contact, flow.credentials().instance()))
            };

            let app2 = app.clone();
            let window2 = window.clone();
            let overlay2 = overlay.clone();
            let phone_entry2 = phone_entry.clone();
            let login_btn2 = login_btn.clone();
            let ctx2 = ctx.clone();
            run_async_to_main(login, move |res| {
                login_btn2.set_sensitive(true);
                match res {
                    Ok((contact, instance)) => {
                        info!("logged in as instance {}, chatting with {}", instance.id, contact.chat_id);
                        crate::ui::main_window::show_chat_window(&app2, ctx2, instance, contact);
                        window2.close();
                    }
                    Err(err) => {
                        overlay2.add_toast(adw::Toast::new(&err.to_string()));
                        if err.concerns_phone() {
                            phone_entry2.grab_focus();
                        }
                    }
                }
            });
        }
    };

    let on_connect: Rc<dyn Fn()> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        login_btn.connect_clicked(move |_| (on_connect)());
    }
    for entry in [&instance_entry, &phone_entry] {
        let on_connect = on_connect.clone();
        entry.connect_activate(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        token_entry.connect_activate(move |_| (on_connect)());
    }

    window.present();
}

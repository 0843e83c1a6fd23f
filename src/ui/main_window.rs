use std::cell::RefCell;
use std::rc::Rc;

use adw::prelude::*;
use adw::Application;
use log::{info, warn};

use greenchat::chat::{ChatUpdate, POLL_FAILED_MESSAGE, SendOutcome};
use greenchat::utils::format_phone;
use greenchat::{ApiClient, ChatSession, Contact, Instance};

use crate::app::AppContext;
use crate::ui::chat_view::ChatView;
use crate::ui::runtime::{RUNTIME, forward_to_main, run_async_to_main};

pub fn show_chat_window(app: &Application, ctx: AppContext, instance: Instance, contact: Contact) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("GreenChat")
        .default_width(720)
        .default_height(640)
        .build();

    let overlay = adw::ToastOverlay::new();

    let display_name = if contact.name.is_empty() { "No name".to_string() } else { contact.name.clone() };
    let header = adw::HeaderBar::new();
    let title = adw::WindowTitle::new(&display_name, &format_phone(&contact.phone));
    header.set_title_widget(Some(&title));
    let avatar = adw::Avatar::new(32, Some(&display_name), true);
    if !contact.avatar_url.is_empty() {
        load_avatar(&ctx.client, &contact.avatar_url, &avatar);
    }
    header.pack_start(&avatar);

    let chat = Rc::new(ChatView::new());
    let error_page = adw::StatusPage::builder()
        .icon_name("dialog-error-symbolic")
        .title(POLL_FAILED_MESSAGE)
        .description("Restart the application to try again.")
        .build();
    let stack = gtk4::Stack::new();
    stack.add_named(&chat.widget(), Some("chat"));
    stack.add_named(&error_page, Some("error"));
    stack.set_visible_child_name("chat");
    overlay.set_child(Some(&stack));

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));
    window.present();

    let session = Rc::new(RefCell::new(ChatSession::new(ctx.client.clone(), instance, contact)));
    let rx = {
        let _guard = RUNTIME.enter();
        session.borrow_mut().start_polling(&ctx.settings)
    };

    {
        let session = session.clone();
        let chat = chat.clone();
        let stack = stack.clone();
        let overlay = overlay.clone();
        forward_to_main(rx, move |event| match session.borrow_mut().handle(event) {
            ChatUpdate::Appended { entry, direction } => chat.append(&entry, direction),
            ChatUpdate::Ignored => {}
            ChatUpdate::Halted(_) => {
                overlay.add_toast(adw::Toast::new(POLL_FAILED_MESSAGE));
                stack.set_visible_child_name("error");
            }
        });
    }

    {
        let session = session.clone();
        let view = chat.clone();
        let overlay = overlay.clone();
        chat.connect_send(move || {
            let outgoing = {
                let mut s = session.borrow_mut();
                s.draft_mut().set(view.entry().text().to_string());
                s.begin_send()
            };
            let Some(outgoing) = outgoing else { return };
            view.entry().set_text("");

            let session = session.clone();
            let view = view.clone();
            let overlay = overlay.clone();
            run_async_to_main(outgoing.deliver(), move |result| {
                let mut s = session.borrow_mut();
                // whatever was typed while the request ran is the current draft
                s.draft_mut().set(view.entry().text().to_string());
                if let SendOutcome::Failed { error, restored } = s.finish_send(result) {
                    overlay.add_toast(adw::Toast::new(&format!("Error: {error}")));
                    if restored {
                        view.entry().set_text(s.draft().text());
                    }
                }
            });
        });
    }

    window.connect_close_request(move |_| {
        info!("chat window closed, stopping poller");
        session.borrow_mut().stop_polling();
        glib::Propagation::Proceed
    });
}

/// Swaps the initials for the contact picture once it has downloaded.
fn load_avatar(client: &ApiClient, url: &str, avatar: &adw::Avatar) {
    let client = client.clone();
    let url = url.to_string();
    let avatar = avatar.clone();
    run_async_to_main(async move { client.fetch_bytes(&url).await }, move |result| {
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("avatar download failed: {e}");
                return;
            }
        };
        match gtk4::gdk::Texture::from_bytes(&glib::Bytes::from_owned(bytes)) {
            Ok(texture) => avatar.set_custom_image(Some(&texture)),
            Err(e) => warn!("avatar is not a usable image: {e}"),
        }
    });
}

use gtk4::prelude::*;
use gtk4 as gtk;

use greenchat::Direction;
use greenchat::api::models::TranscriptEntry;

pub struct ChatView {
    root: gtk::Box,
    scroller: gtk::ScrolledWindow,
    messages_box: gtk::Box,
    entry: gtk::Entry,
    send_btn: gtk::Button,
}

impl ChatView {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .build();
        let messages_box = gtk::Box::new(gtk::Orientation::Vertical, 12);
        messages_box.set_margin_top(12);
        messages_box.set_margin_bottom(12);
        scroller.set_child(Some(&messages_box));
        root.append(&scroller);

        // Input row
        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message…"));
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        input_row.append(&entry);
        input_row.append(&send_btn);
        root.append(&input_row);

        Self {
            root,
            scroller,
            messages_box,
            entry,
            send_btn,
        }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn entry(&self) -> &gtk::Entry {
        &self.entry
    }

    /// Both the button and Enter in the entry.
    pub fn connect_send<F: Fn() + 'static>(&self, f: F) {
        use std::rc::Rc;
        let send: Rc<dyn Fn()> = Rc::new(f);
        {
            let send = send.clone();
            self.send_btn.connect_clicked(move |_| (send)());
        }
        self.entry.connect_activate(move |_| (send)());
    }

    pub fn append(&self, message: &TranscriptEntry, direction: Direction) {
        let bubble = gtk::Label::new(Some(&message.text));
        bubble.set_wrap(true);
        bubble.set_wrap_mode(gtk4::pango::WrapMode::WordChar);
        bubble.set_max_width_chars(48);
        bubble.set_xalign(0.0);
        bubble.set_selectable(true);
        bubble.add_css_class("card");
        bubble.set_margin_start(12);
        bubble.set_margin_end(12);
        match direction {
            Direction::Incoming => bubble.set_halign(gtk::Align::Start),
            Direction::Outgoing => {
                bubble.set_halign(gtk::Align::End);
                bubble.add_css_class("accent");
            }
        }
        if !message.id.is_empty() {
            bubble.set_tooltip_text(Some(&message.id));
        }
        self.messages_box.append(&bubble);

        let adj = self.scroller.vadjustment();
        glib::idle_add_local_once(move || {
            adj.set_value(adj.upper() - adj.page_size());
        });
    }
}

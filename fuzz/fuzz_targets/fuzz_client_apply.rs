//! Fuzz target for the client apply engine.
//!
//! Feeds arbitrary packet streams to a client session tracking one small
//! container. Resolution failures and malformed packets must degrade to
//! skipped updates.
//!
//! # Safety Properties Tested
//! - No panics on arbitrary packet streams
//! - Nested widget trees survive arbitrary add/remove sequences

#![no_main]

use libfuzzer_sys::fuzz_target;

use livegump::{
    ContainerId, ElementId, GumpContainer, SessionBuilder, TextCapability, UiHost, Widget,
    WidgetPayload, WidgetSpec,
};

struct Node {
    id: Option<ElementId>,
    children: Vec<Box<dyn Widget>>,
    text: String,
}

impl TextCapability for Node {
    fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
    }
}

impl Widget for Node {
    fn local_id(&self) -> Option<ElementId> {
        self.id
    }

    fn children(&self) -> &[Box<dyn Widget>] {
        &self.children
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Box<dyn Widget>>> {
        Some(&mut self.children)
    }

    fn text_mut(&mut self) -> Option<&mut dyn TextCapability> {
        Some(self)
    }
}

struct Form {
    children: Vec<Box<dyn Widget>>,
    disposed: bool,
}

impl GumpContainer for Form {
    fn server_id(&self) -> ContainerId {
        ContainerId::new(1)
    }

    fn children(&self) -> &[Box<dyn Widget>] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Box<dyn Widget>> {
        &mut self.children
    }

    fn mark_dirty(&mut self) {}

    fn request_refresh(&mut self) {}

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

struct Host {
    form: Option<Form>,
}

impl UiHost for Host {
    type Handle = u8;

    fn container(&self, _: u8) -> Option<&dyn GumpContainer> {
        self.form.as_ref().map(|f| f as &dyn GumpContainer)
    }

    fn container_mut(&mut self, _: u8) -> Option<&mut dyn GumpContainer> {
        self.form.as_mut().map(|f| f as &mut dyn GumpContainer)
    }

    fn open_containers(&self) -> Vec<u8> {
        self.form.iter().map(|_| 0).collect()
    }

    fn create_widget(&mut self, spec: &WidgetSpec) -> Option<Box<dyn Widget>> {
        match &spec.payload {
            WidgetPayload::Label(label) => Some(Box::new(Node {
                id: Some(spec.id),
                children: Vec::new(),
                text: label.text.clone(),
            })),
            _ => None,
        }
    }

    fn close_container(&mut self, _: u8) {
        self.form = None;
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(mut client) = SessionBuilder::new().start_client_session::<u8>() else {
        return;
    };
    let nested: Box<dyn Widget> = Box::new(Node {
        id: Some(ElementId::new(42)),
        children: Vec::new(),
        text: String::new(),
    });
    let mut host = Host {
        form: Some(Form {
            children: vec![Box::new(Node {
                id: None,
                children: vec![nested],
                text: String::new(),
            })],
            disposed: false,
        }),
    };
    client.track(ContainerId::new(1), 0);

    let _outcomes = client.handle_packets(&mut host, data);
});

//! Stub widget toolkit.
//!
//! Widgets keep their observable state behind `Rc<RefCell<_>>` so a test can
//! hold on to it after the widget itself has been boxed into a form.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use livegump::{
    Animatable, AnimationKind, ContainerId, ElementId, GraphicCapability, GumpContainer,
    HueCapability, PositionCapability, SizeCapability, TextCapability, UiHost,
    VisibilityCapability, Widget, WidgetPayload, WidgetSpec,
};

pub type Shared<T> = Rc<RefCell<T>>;

// ============================================================================
// Widgets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelState {
    pub text: String,
    pub hue: Option<u16>,
    pub visible: bool,
    pub x: i16,
    pub y: i16,
    pub animations: Vec<(AnimationKind, Duration)>,
    pub disposed: bool,
}

impl LabelState {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            hue: None,
            visible: true,
            x: 0,
            y: 0,
            animations: Vec::new(),
            disposed: false,
        }
    }
}

/// Text, hue, visibility, position and animation. No size or graphic.
pub struct Label {
    id: Option<ElementId>,
    state: Shared<LabelState>,
}

impl Label {
    pub fn new(id: Option<u32>, text: &str) -> (Box<dyn Widget>, Shared<LabelState>) {
        let state = Rc::new(RefCell::new(LabelState::new(text)));
        let label = Self {
            id: id.map(ElementId::new),
            state: Rc::clone(&state),
        };
        (Box::new(label), state)
    }
}

impl TextCapability for Label {
    fn set_text(&mut self, text: &str) {
        text.clone_into(&mut self.state.borrow_mut().text);
    }
}

impl HueCapability for Label {
    fn set_hue(&mut self, hue: u16) {
        self.state.borrow_mut().hue = Some(hue);
    }
}

impl VisibilityCapability for Label {
    fn set_visible(&mut self, visible: bool) {
        self.state.borrow_mut().visible = visible;
    }
}

impl PositionCapability for Label {
    fn set_x(&mut self, x: i16) {
        self.state.borrow_mut().x = x;
    }

    fn set_y(&mut self, y: i16) {
        self.state.borrow_mut().y = y;
    }
}

impl Animatable for Label {
    fn animate(&mut self, kind: AnimationKind, duration: Duration) {
        self.state.borrow_mut().animations.push((kind, duration));
    }
}

impl Widget for Label {
    fn local_id(&self) -> Option<ElementId> {
        self.id
    }

    fn text_mut(&mut self) -> Option<&mut dyn TextCapability> {
        Some(self)
    }

    fn hue_mut(&mut self) -> Option<&mut dyn HueCapability> {
        Some(self)
    }

    fn visibility_mut(&mut self) -> Option<&mut dyn VisibilityCapability> {
        Some(self)
    }

    fn position_mut(&mut self) -> Option<&mut dyn PositionCapability> {
        Some(self)
    }

    fn animation_mut(&mut self) -> Option<&mut dyn Animatable> {
        Some(self)
    }

    fn dispose(&mut self) {
        self.state.borrow_mut().disposed = true;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureState {
    pub graphic: u16,
    pub hue: u16,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub disposed: bool,
}

/// Graphic, hue and size. No text and no animation.
pub struct Picture {
    id: Option<ElementId>,
    state: Shared<PictureState>,
}

impl Picture {
    pub fn new(id: Option<u32>, graphic: u16) -> (Box<dyn Widget>, Shared<PictureState>) {
        let state = Rc::new(RefCell::new(PictureState {
            graphic,
            ..PictureState::default()
        }));
        let picture = Self {
            id: id.map(ElementId::new),
            state: Rc::clone(&state),
        };
        (Box::new(picture), state)
    }
}

impl GraphicCapability for Picture {
    fn set_graphic(&mut self, graphic: u16) {
        self.state.borrow_mut().graphic = graphic;
    }
}

impl HueCapability for Picture {
    fn set_hue(&mut self, hue: u16) {
        self.state.borrow_mut().hue = hue;
    }
}

impl SizeCapability for Picture {
    fn set_width(&mut self, width: u16) {
        self.state.borrow_mut().width = Some(width);
    }

    fn set_height(&mut self, height: u16) {
        self.state.borrow_mut().height = Some(height);
    }
}

impl Widget for Picture {
    fn local_id(&self) -> Option<ElementId> {
        self.id
    }

    fn graphic_mut(&mut self) -> Option<&mut dyn GraphicCapability> {
        Some(self)
    }

    fn hue_mut(&mut self) -> Option<&mut dyn HueCapability> {
        Some(self)
    }

    fn size_mut(&mut self) -> Option<&mut dyn SizeCapability> {
        Some(self)
    }

    fn dispose(&mut self) {
        self.state.borrow_mut().disposed = true;
    }
}

/// A grouping widget with no capabilities of its own.
pub struct Panel {
    id: Option<ElementId>,
    children: Vec<Box<dyn Widget>>,
}

impl Panel {
    pub fn new(id: Option<u32>, children: Vec<Box<dyn Widget>>) -> Box<dyn Widget> {
        Box::new(Self {
            id: id.map(ElementId::new),
            children,
        })
    }
}

impl Widget for Panel {
    fn local_id(&self) -> Option<ElementId> {
        self.id
    }

    fn children(&self) -> &[Box<dyn Widget>] {
        &self.children
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Box<dyn Widget>>> {
        Some(&mut self.children)
    }
}

// ============================================================================
// Container and host
// ============================================================================

pub struct Form {
    pub server_id: ContainerId,
    pub local_id: Option<ContainerId>,
    pub children: Vec<Box<dyn Widget>>,
    pub dirty: u32,
    pub refreshes: u32,
    pub disposed: bool,
}

impl Form {
    pub fn new(server_id: u32, children: Vec<Box<dyn Widget>>) -> Self {
        Self {
            server_id: ContainerId::new(server_id),
            local_id: None,
            children,
            dirty: 0,
            refreshes: 0,
            disposed: false,
        }
    }

    pub fn with_local_id(mut self, local_id: u32) -> Self {
        self.local_id = Some(ContainerId::new(local_id));
        self
    }
}

impl GumpContainer for Form {
    fn server_id(&self) -> ContainerId {
        self.server_id
    }

    fn local_id(&self) -> Option<ContainerId> {
        self.local_id
    }

    fn children(&self) -> &[Box<dyn Widget>] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Box<dyn Widget>> {
        &mut self.children
    }

    fn mark_dirty(&mut self) {
        self.dirty += 1;
    }

    fn request_refresh(&mut self) {
        self.refreshes += 1;
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Builds labels and pictures; every other widget kind is unsupported.
#[derive(Default)]
pub struct StubHost {
    pub forms: BTreeMap<u32, Form>,
    next_handle: u32,
    pub created_labels: BTreeMap<ElementId, Shared<LabelState>>,
    pub created_pictures: BTreeMap<ElementId, Shared<PictureState>>,
    pub closed: Vec<u32>,
}

impl StubHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows a form and returns its handle.
    pub fn open(&mut self, form: Form) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.forms.insert(handle, form);
        handle
    }

    pub fn form(&self, handle: u32) -> &Form {
        &self.forms[&handle]
    }
}

impl UiHost for StubHost {
    type Handle = u32;

    fn container(&self, handle: u32) -> Option<&dyn GumpContainer> {
        self.forms.get(&handle).map(|f| f as &dyn GumpContainer)
    }

    fn container_mut(&mut self, handle: u32) -> Option<&mut dyn GumpContainer> {
        self.forms
            .get_mut(&handle)
            .map(|f| f as &mut dyn GumpContainer)
    }

    fn open_containers(&self) -> Vec<u32> {
        self.forms.keys().copied().collect()
    }

    fn create_widget(&mut self, spec: &WidgetSpec) -> Option<Box<dyn Widget>> {
        match &spec.payload {
            WidgetPayload::Label(label) => {
                let (widget, state) = Label::new(Some(spec.id.as_u32()), &label.text);
                {
                    let mut state = state.borrow_mut();
                    state.hue = label.hue;
                    state.x = spec.x;
                    state.y = spec.y;
                }
                self.created_labels.insert(spec.id, state);
                Some(widget)
            },
            WidgetPayload::Image(image) => {
                let (widget, state) = Picture::new(Some(spec.id.as_u32()), image.graphic);
                state.borrow_mut().hue = image.hue;
                self.created_pictures.insert(spec.id, state);
                Some(widget)
            },
            WidgetPayload::HtmlText(_) | WidgetPayload::Button(_) | WidgetPayload::TextEntry(_) => {
                None
            },
        }
    }

    fn close_container(&mut self, handle: u32) {
        if self.forms.remove(&handle).is_some() {
            self.closed.push(handle);
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Keeps every packet it is handed; owned by the session under test.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub packets: Vec<Vec<u8>>,
    pub connected: bool,
}

impl RecordingTransport {
    pub fn connected() -> Self {
        Self {
            packets: Vec::new(),
            connected: true,
        }
    }
}

impl livegump::Transport for RecordingTransport {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, packet: &[u8]) {
        self.packets.push(packet.to_vec());
    }
}

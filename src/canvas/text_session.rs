use crate::geometry::{Point, Rect};
use crate::overlay::{Overlay, OverlayId, OverlayStyle};
use crate::render::text::font_book;

/// Inline text entry, either for a new overlay or for an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSession {
    target: Option<OverlayId>,
    origin: Point,
    text: String,
    style: OverlayStyle,
}

impl TextSession {
    pub fn new(origin: Point, style: OverlayStyle) -> Self {
        Self {
            target: None,
            origin,
            text: String::new(),
            style,
        }
    }

    pub fn editing(overlay: &Overlay) -> Self {
        Self {
            target: Some(overlay.id),
            origin: overlay.frame.origin(),
            text: overlay.text_content().to_string(),
            style: overlay.style.clone(),
        }
    }

    pub fn target(&self) -> Option<OverlayId> {
        self.target
    }

    /// Turns the session into new text, for when its overlay was removed.
    pub fn detach(&mut self) {
        self.target = None;
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn insert(&mut self, ch: char) {
        if !ch.is_control() || ch == '\n' {
            self.text.push(ch);
        }
    }

    pub fn delete_backward(&mut self) {
        self.text.pop();
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Frame the text occupies once committed.
    pub fn measured_frame(&self) -> Rect {
        let size = font_book().measure(&self.text, &self.style.font_name, self.style.font_size);
        Rect::from_origin_size(self.origin, size)
    }

    /// Overlay shape of the session as it stands; the id is a placeholder.
    pub fn to_overlay(&self) -> Overlay {
        Overlay::text(
            self.target.unwrap_or(OverlayId(0)),
            self.measured_frame(),
            self.text.clone(),
            self.style.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayKind;

    #[test]
    fn editing_text_inserts_and_deletes_characters() {
        let mut session = TextSession::new(Point::new(10.0, 20.0), OverlayStyle::default());
        assert!(session.is_blank());
        for ch in "hi!".chars() {
            session.insert(ch);
        }
        session.insert('\u{7}');
        session.delete_backward();
        session.insert('\n');
        session.insert('x');
        assert_eq!(session.text(), "hi\nx");
        assert!(!session.is_blank());
    }

    #[test]
    fn session_for_existing_overlay_starts_from_its_text() {
        let overlay = Overlay::text(
            OverlayId(4),
            Rect::new(1.0, 2.0, 30.0, 10.0),
            "label",
            OverlayStyle::default(),
        );
        let session = TextSession::editing(&overlay);
        assert_eq!(session.target(), Some(OverlayId(4)));
        assert_eq!(session.text(), "label");
        assert_eq!(session.origin(), Point::new(1.0, 2.0));

        let preview = session.to_overlay();
        assert_eq!(preview.kind, OverlayKind::Text);
        assert_eq!(preview.frame.origin(), Point::new(1.0, 2.0));
        assert!(preview.frame.height > 0.0);
    }
}

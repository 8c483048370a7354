use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
};
use std::panic::{self, AssertUnwindSafe};

/// Rough advance of a narrow glyph as a fraction of the font size.
const APPROX_ADVANCE: f64 = 0.6;

/// Width of `text` at `size` pixels without measuring glyphs. Non-ASCII
/// characters (CJK labels in particular) count as a full em.
pub fn approx_text_width(text: &str, size: f64) -> f64 {
    text.chars()
        .map(|c| if c.is_ascii() { APPROX_ADVANCE } else { 1.0 })
        .sum::<f64>()
        * size
}

/// Wraps a backend so that a missing or broken font drops the text instead
/// of failing the whole image. Markers, axes and grid are still drawn.
pub struct TextSafeBackend<DB> {
    inner: DB,
}

impl<DB> TextSafeBackend<DB> {
    pub fn new(inner: DB) -> Self {
        Self { inner }
    }
}

impl<DB: DrawingBackend> DrawingBackend for TextSafeBackend<DB> {
    type ErrorType = DB::ErrorType;

    fn get_size(&self) -> (u32, u32) {
        self.inner.get_size()
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.ensure_prepared()
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.present()
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_pixel(point, color)
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_line(from, to, style)
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_rect(upper_left, bottom_right, style, fill)
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_path(path, style)
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_circle(center, radius, style, fill)
    }

    fn blit_bitmap(
        &mut self,
        pos: BackendCoord,
        (iw, ih): (u32, u32),
        src: &[u8],
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.blit_bitmap(pos, (iw, ih), src)
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        let inner = &mut self.inner;
        match panic::catch_unwind(AssertUnwindSafe(|| inner.draw_text(text, style, pos))) {
            Ok(Err(DrawingErrorKind::FontError(err))) => {
                log::trace!("text {:?} not drawn: {}", text, err);
                Ok(())
            }
            Ok(result) => result,
            Err(_) => {
                log::trace!("text {:?} not drawn: font backend panicked", text);
                Ok(())
            }
        }
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        let inner = &self.inner;
        match panic::catch_unwind(AssertUnwindSafe(|| inner.estimate_text_size(text, style))) {
            Ok(Err(DrawingErrorKind::FontError(_))) | Err(_) => {
                let size = style.size().max(1.0);
                let width = approx_text_width(text, size);
                Ok((width.ceil() as u32, size.ceil() as u32))
            }
            Ok(result) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotters::prelude::*;

    #[test]
    fn wide_characters_take_a_full_em() {
        assert_eq!(approx_text_width("ab", 10.0), 12.0);
        assert_eq!(approx_text_width("进程", 10.0), 20.0);
        assert_eq!(approx_text_width("", 10.0), 0.0);
    }

    #[test]
    fn unregistered_font_still_measures_and_draws() {
        let mut buf = vec![0u8; 200 * 100 * 3];
        let mut backend = TextSafeBackend::new(BitMapBackend::with_buffer(&mut buf, (200, 100)));
        let style = FontDesc::new(
            FontFamily::Name("no-such-family-registered"),
            20.0,
            FontStyle::Normal,
        )
        .color(&BLACK);
        let (w, h) = backend.estimate_text_size("Process 1", &style).unwrap();
        assert!(w > 0 && h > 0);
        backend.draw_text("Process 1", &style, (10, 10)).unwrap();
        backend.present().unwrap();
    }
}

mod adapter;

pub use adapter::{ExposedPixels, ViewAdapter};

use model::Rect;
use thiserror::Error;
use tiles::BufferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViewTransformError {
    #[error("view scale must be finite and positive")]
    InvalidScale,
    #[error("viewport has no area")]
    InvalidViewport,
    #[error("view arithmetic produced a non-finite value")]
    NonFiniteValue,
    #[error("view coordinate leaves the i32 range")]
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewError {
    #[error(transparent)]
    Transform(#[from] ViewTransformError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Maps canvas pixels to device pixels: `device = (canvas - origin) * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    scale: f64,
    origin_x: i32,
    origin_y: i32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            origin_x: 0,
            origin_y: 0,
        }
    }
}

impl ViewTransform {
    pub fn new(origin_x: i32, origin_y: i32, scale: f64) -> Result<Self, ViewTransformError> {
        let mut transform = Self {
            origin_x,
            origin_y,
            ..Self::default()
        };
        transform.set_scale(scale)?;
        Ok(transform)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn origin_x(&self) -> i32 {
        self.origin_x
    }

    pub fn origin_y(&self) -> i32 {
        self.origin_y
    }

    pub fn set_scale(&mut self, scale: f64) -> Result<(), ViewTransformError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ViewTransformError::InvalidScale);
        }
        self.scale = scale;
        Ok(())
    }

    pub fn set_origin(&mut self, origin_x: i32, origin_y: i32) {
        self.origin_x = origin_x;
        self.origin_y = origin_y;
    }

    /// Drags the canvas by a device-space delta.
    pub fn pan_by(&mut self, delta_x: f64, delta_y: f64) -> Result<(), ViewTransformError> {
        let canvas_dx = checked_div(delta_x, self.scale)?;
        let canvas_dy = checked_div(delta_y, self.scale)?;
        let origin_x = checked_add(f64::from(self.origin_x), -canvas_dx)?;
        let origin_y = checked_add(f64::from(self.origin_y), -canvas_dy)?;
        self.origin_x = to_i32(origin_x.round())?;
        self.origin_y = to_i32(origin_y.round())?;
        Ok(())
    }

    /// Multiplies the scale by `zoom_factor`, keeping the canvas point under
    /// the device point in place (up to whole canvas pixels).
    pub fn zoom_about_point(
        &mut self,
        zoom_factor: f64,
        point_x: f64,
        point_y: f64,
    ) -> Result<(), ViewTransformError> {
        if !zoom_factor.is_finite() || zoom_factor <= 0.0 {
            return Err(ViewTransformError::InvalidScale);
        }
        if !point_x.is_finite() || !point_y.is_finite() {
            return Err(ViewTransformError::NonFiniteValue);
        }

        let next_scale = checked_mul(self.scale, zoom_factor)?;
        if next_scale <= 0.0 {
            return Err(ViewTransformError::InvalidScale);
        }
        let (anchor_x, anchor_y) = self.screen_to_canvas_point(point_x, point_y)?;
        let origin_x = checked_add(anchor_x, -checked_div(point_x, next_scale)?)?;
        let origin_y = checked_add(anchor_y, -checked_div(point_y, next_scale)?)?;

        self.origin_x = to_i32(origin_x.round())?;
        self.origin_y = to_i32(origin_y.round())?;
        self.scale = next_scale;
        Ok(())
    }

    pub fn screen_to_canvas_point(
        &self,
        screen_x: f64,
        screen_y: f64,
    ) -> Result<(f64, f64), ViewTransformError> {
        if !screen_x.is_finite() || !screen_y.is_finite() {
            return Err(ViewTransformError::NonFiniteValue);
        }
        let canvas_x = checked_add(f64::from(self.origin_x), checked_div(screen_x, self.scale)?)?;
        let canvas_y = checked_add(f64::from(self.origin_y), checked_div(screen_y, self.scale)?)?;
        Ok((canvas_x, canvas_y))
    }

    /// Device rectangle covering canvas `rect`: near edges round down, far
    /// edges round up.
    pub fn canvas_to_device(&self, rect: Rect) -> Result<Rect, ViewTransformError> {
        let left = self.canvas_to_device_coordinate(rect.x, self.origin_x)?;
        let top = self.canvas_to_device_coordinate(rect.y, self.origin_y)?;
        let right = self.canvas_to_device_coordinate(rect.right(), self.origin_x)?;
        let bottom = self.canvas_to_device_coordinate(rect.bottom(), self.origin_y)?;
        Ok(Rect::from_edges(
            to_i32(left.floor())?,
            to_i32(top.floor())?,
            to_i32(right.ceil())?,
            to_i32(bottom.ceil())?,
        ))
    }

    fn canvas_to_device_coordinate(
        &self,
        canvas: i32,
        origin: i32,
    ) -> Result<f64, ViewTransformError> {
        checked_mul(f64::from(canvas) - f64::from(origin), self.scale)
    }

    /// Canvas rectangle covering device `rect`.
    pub fn device_to_canvas(&self, rect: Rect) -> Result<Rect, ViewTransformError> {
        let (left, top) = self.screen_to_canvas_point(f64::from(rect.x), f64::from(rect.y))?;
        let (right, bottom) =
            self.screen_to_canvas_point(f64::from(rect.right()), f64::from(rect.bottom()))?;
        Ok(Rect::from_edges(
            to_i32(left.floor())?,
            to_i32(top.floor())?,
            to_i32(right.ceil())?,
            to_i32(bottom.ceil())?,
        ))
    }
}

fn checked_add(current: f64, delta: f64) -> Result<f64, ViewTransformError> {
    if !delta.is_finite() {
        return Err(ViewTransformError::NonFiniteValue);
    }
    let next = current + delta;
    if !next.is_finite() {
        return Err(ViewTransformError::NonFiniteValue);
    }
    Ok(next)
}

fn checked_mul(left: f64, right: f64) -> Result<f64, ViewTransformError> {
    if !left.is_finite() || !right.is_finite() {
        return Err(ViewTransformError::NonFiniteValue);
    }
    let next = left * right;
    if !next.is_finite() {
        return Err(ViewTransformError::NonFiniteValue);
    }
    Ok(next)
}

fn checked_div(numerator: f64, denominator: f64) -> Result<f64, ViewTransformError> {
    if denominator == 0.0 {
        return Err(ViewTransformError::InvalidScale);
    }
    if !numerator.is_finite() || !denominator.is_finite() {
        return Err(ViewTransformError::NonFiniteValue);
    }
    let next = numerator / denominator;
    if !next.is_finite() {
        return Err(ViewTransformError::NonFiniteValue);
    }
    Ok(next)
}

fn to_i32(value: f64) -> Result<i32, ViewTransformError> {
    if !value.is_finite() {
        return Err(ViewTransformError::NonFiniteValue);
    }
    if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(ViewTransformError::OutOfRange);
    }
    Ok(value as i32)
}

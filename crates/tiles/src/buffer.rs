use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use model::{AbyssPolicy, MAX_LEVEL, PixelFormat, Rect, TileCoord, TileGrid, convert_pixels};

use crate::tile::Tile;
use crate::{BufferError, InvalidRegionReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiledBufferConfig {
    pub tile_edge: u32,
    pub format: PixelFormat,
    pub abyss: AbyssPolicy,
}

impl Default for TiledBufferConfig {
    fn default() -> Self {
        Self {
            tile_edge: model::DEFAULT_TILE_EDGE,
            format: PixelFormat::RgbaF32,
            abyss: AbyssPolicy::Clamp,
        }
    }
}

/// Sparse grid of tiles covering an extent, addressable at power-of-two
/// levels of detail.
///
/// Rectangles passed to the public API are in level-0 units; level `n` reads
/// and writes `rect.to_level(n)` pixels. Cells that were never written read
/// as zero without allocating a tile.
pub struct TiledBuffer {
    extent: Rect,
    format: PixelFormat,
    grid: TileGrid,
    abyss: AbyssPolicy,
    tiles: Mutex<HashMap<TileCoord, Arc<Tile>>>,
}

impl fmt::Debug for TiledBuffer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TiledBuffer")
            .field("extent", &self.extent)
            .field("format", &self.format)
            .field("tile_edge", &self.grid.tile_edge())
            .field("abyss", &self.abyss)
            .field("tile_count", &self.tile_count())
            .finish()
    }
}

impl TiledBuffer {
    pub fn new(extent: Rect, config: TiledBufferConfig) -> Result<Self, BufferError> {
        let grid = TileGrid::new(config.tile_edge)?;
        Ok(Self {
            extent,
            format: config.format,
            grid,
            abyss: config.abyss,
            tiles: Mutex::new(HashMap::new()),
        })
    }

    pub fn extent(&self) -> Rect {
        self.extent
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    pub fn tile_edge(&self) -> u32 {
        self.grid.tile_edge()
    }

    pub fn abyss(&self) -> AbyssPolicy {
        self.abyss
    }

    pub fn level_extent(&self, level: u8) -> Rect {
        self.extent.to_level(level)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles().len()
    }

    pub fn tile(&self, coord: TileCoord) -> Option<Arc<Tile>> {
        self.tiles().get(&coord).cloned()
    }

    /// Pixel dimensions `get` produces for `rect` at `level` and `scale`.
    pub fn output_size(rect: Rect, level: u8, scale: f64) -> (usize, usize) {
        let source = rect.to_level(level);
        (
            scaled_len(source.width, scale),
            scaled_len(source.height, scale),
        )
    }

    /// Reads `rect` at `level`, resampled by `scale` with point sampling, into
    /// `dst` as `format` pixels. `dst` must hold exactly
    /// [`TiledBuffer::output_size`] pixels.
    pub fn get(
        &self,
        rect: Rect,
        level: u8,
        format: PixelFormat,
        scale: f64,
        abyss: AbyssPolicy,
        dst: &mut [u8],
    ) -> Result<(), BufferError> {
        check_level(level)?;
        if rect.is_empty() {
            return Err(BufferError::invalid_region(rect, InvalidRegionReason::Empty));
        }
        self.read_level(level, rect.to_level(level), format, scale, abyss, dst)
            .map_err(|error| error.with_rect(rect))
    }

    /// Level 0, scale 1 and the buffer's own abyss policy.
    pub fn read(&self, rect: Rect, format: PixelFormat) -> Result<Vec<u8>, BufferError> {
        let mut pixels = vec![0u8; rect.area() as usize * format.bytes_per_pixel()];
        self.get(rect, 0, format, 1.0, self.abyss, &mut pixels)?;
        Ok(pixels)
    }

    /// Writes `data` (`rect.to_level(level)` pixels of `format`) and returns
    /// the rectangle actually stored, in level-0 units.
    pub fn set(
        &self,
        rect: Rect,
        level: u8,
        format: PixelFormat,
        data: &[u8],
    ) -> Result<Rect, BufferError> {
        check_level(level)?;
        if rect.is_empty() {
            return Err(BufferError::invalid_region(rect, InvalidRegionReason::Empty));
        }
        self.write_level(level, rect.to_level(level), format, self.abyss, data)
            .map_err(|error| error.with_rect(rect))
    }

    /// Drops every tile whose footprint lies inside `rect`, plus derived mip
    /// tiles touching it. Returns the number of tiles removed.
    pub fn evict(&self, rect: Rect) -> usize {
        let grid = self.grid;
        let mut tiles = self.tiles();
        let before = tiles.len();
        tiles.retain(|coord, _| {
            let footprint = footprint(grid, *coord);
            let covered = rect.contains_rect(&footprint);
            let derived_and_touched = coord.level > 0 && footprint.intersects(&rect);
            !(covered || derived_and_touched)
        });
        let removed = before - tiles.len();
        if removed > 0 {
            log::debug!("evicted {removed} tiles inside {rect:?}");
        }
        removed
    }

    pub fn dirty_tiles(&self) -> Vec<TileCoord> {
        let mut dirty: Vec<_> = self
            .tiles()
            .iter()
            .filter(|(_, tile)| tile.is_dirty())
            .map(|(coord, _)| *coord)
            .collect();
        dirty.sort();
        dirty
    }

    pub fn clear_dirty(&self) {
        for tile in self.tiles().values() {
            tile.clear_dirty();
        }
    }

    pub(crate) fn read_level(
        &self,
        level: u8,
        source: Rect,
        format: PixelFormat,
        scale: f64,
        abyss: AbyssPolicy,
        dst: &mut [u8],
    ) -> Result<(), BufferError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(BufferError::InvalidScale(scale));
        }
        let level_extent = self.level_extent(level);
        if abyss == AbyssPolicy::None && !level_extent.contains_rect(&source) {
            return Err(BufferError::invalid_region(
                source,
                InvalidRegionReason::OutsideExtent,
            ));
        }
        let out_width = scaled_len(source.width, scale);
        let out_height = scaled_len(source.height, scale);
        let bpp = format.bytes_per_pixel();
        let expected = out_width * out_height * bpp;
        if dst.len() != expected {
            return Err(BufferError::BufferLength {
                expected,
                actual: dst.len(),
            });
        }

        let columns: Vec<Option<i32>> = (0..out_width)
            .map(|index| {
                let sample_x = source.x + sample_offset(index, scale, source.width);
                abyss.map_coordinate(sample_x, level_extent.x, level_extent.right())
            })
            .collect();
        let row_bytes = out_width * bpp;
        for (row_index, dst_row) in dst.chunks_exact_mut(row_bytes.max(1)).enumerate() {
            if row_index >= out_height {
                break;
            }
            let sample_y = source.y + sample_offset(row_index, scale, source.height);
            match abyss.map_coordinate(sample_y, level_extent.y, level_extent.bottom()) {
                Some(row) => self.read_row(level, row, &columns, format, dst_row)?,
                None => dst_row.fill(0),
            }
        }
        Ok(())
    }

    fn read_row(
        &self,
        level: u8,
        row: i32,
        columns: &[Option<i32>],
        format: PixelFormat,
        dst_row: &mut [u8],
    ) -> Result<(), BufferError> {
        let bpp = format.bytes_per_pixel();
        let src_bpp = self.format.bytes_per_pixel();
        let edge = self.grid.tile_edge() as i32;
        let tile_y = self.grid.tile_index(row);
        let local_y = row - tile_y * edge;

        let mut start = 0;
        while start < columns.len() {
            let Some(first_x) = columns[start] else {
                dst_row[start * bpp..(start + 1) * bpp].fill(0);
                start += 1;
                continue;
            };
            let tile_x = self.grid.tile_index(first_x);
            let mut end = start + 1;
            while end < columns.len()
                && columns[end].is_some_and(|x| self.grid.tile_index(x) == tile_x)
            {
                end += 1;
            }

            let run_dst = &mut dst_row[start * bpp..end * bpp];
            match self.tile_for_read(TileCoord::new(tile_x, tile_y, level))? {
                None => run_dst.fill(0),
                Some(tile) => {
                    let run = &columns[start..end];
                    tile.read_transient(|data| {
                        let row_offset = local_y as usize * edge as usize;
                        let contiguous = run
                            .windows(2)
                            .all(|pair| matches!(pair, [Some(a), Some(b)] if *b == *a + 1));
                        if contiguous {
                            let local_x = (first_x - tile_x * edge) as usize;
                            let offset = (row_offset + local_x) * src_bpp;
                            let pixels = run.len();
                            return convert_pixels(
                                self.format,
                                &data[offset..offset + pixels * src_bpp],
                                format,
                                run_dst,
                                pixels,
                            );
                        }
                        for (sample, pixel) in run.iter().zip(run_dst.chunks_exact_mut(bpp)) {
                            let Some(x) = sample else { continue };
                            let local_x = (x - tile_x * edge) as usize;
                            let offset = (row_offset + local_x) * src_bpp;
                            convert_pixels(
                                self.format,
                                &data[offset..offset + src_bpp],
                                format,
                                pixel,
                                1,
                            )?;
                        }
                        Ok(())
                    })?;
                }
            }
            start = end;
        }
        Ok(())
    }

    /// Copies a rectangle lying inside one tile and inside the level extent,
    /// taking the tile lock once.
    pub(crate) fn read_within_tile(
        &self,
        level: u8,
        source: Rect,
        format: PixelFormat,
        dst: &mut [u8],
    ) -> Result<(), BufferError> {
        let coord = TileCoord::new(
            self.grid.tile_index(source.x),
            self.grid.tile_index(source.y),
            level,
        );
        let Some(tile) = self.tile_for_read(coord)? else {
            dst.fill(0);
            return Ok(());
        };
        let edge = self.grid.tile_edge() as i32;
        let src_bpp = self.format.bytes_per_pixel();
        let row_bytes = source.width as usize * format.bytes_per_pixel();
        let local_x = (source.x - coord.tile_x * edge) as usize;
        tile.read_transient(|data| {
            for (row_index, dst_row) in dst.chunks_exact_mut(row_bytes).enumerate() {
                let local_y = (source.y - coord.tile_y * edge) as usize + row_index;
                let offset = (local_y * edge as usize + local_x) * src_bpp;
                let pixels = source.width as usize;
                convert_pixels(
                    self.format,
                    &data[offset..offset + pixels * src_bpp],
                    format,
                    dst_row,
                    pixels,
                )?;
            }
            Ok::<(), BufferError>(())
        })
    }

    pub(crate) fn write_level(
        &self,
        level: u8,
        source: Rect,
        format: PixelFormat,
        abyss: AbyssPolicy,
        data: &[u8],
    ) -> Result<Rect, BufferError> {
        let bpp = format.bytes_per_pixel();
        let expected = source.area() as usize * bpp;
        if data.len() != expected {
            return Err(BufferError::BufferLength {
                expected,
                actual: data.len(),
            });
        }
        let level_extent = self.level_extent(level);
        if abyss == AbyssPolicy::None && !level_extent.contains_rect(&source) {
            return Err(BufferError::invalid_region(
                source,
                InvalidRegionReason::OutsideExtent,
            ));
        }
        let writable = source.intersect(&level_extent);
        if writable.is_empty() {
            return Ok(Rect::EMPTY);
        }

        let edge = self.grid.tile_edge() as i32;
        let dst_bpp = self.format.bytes_per_pixel();
        let src_stride = source.width as usize * bpp;
        for coord in self.grid.tiles_in(writable, level) {
            let covered = self
                .grid
                .tile_rect(coord.tile_x, coord.tile_y)
                .intersect(&writable);
            let tile = self.tile_for_write(coord)?;
            tile.write_transient(|tile_data| {
                let pixels = covered.width as usize;
                for row in covered.y..covered.bottom() {
                    let src_offset = (row - source.y) as usize * src_stride
                        + (covered.x - source.x) as usize * bpp;
                    let local_y = (row - coord.tile_y * edge) as usize;
                    let local_x = (covered.x - coord.tile_x * edge) as usize;
                    let dst_offset = (local_y * edge as usize + local_x) * dst_bpp;
                    convert_pixels(
                        format,
                        &data[src_offset..src_offset + pixels * bpp],
                        self.format,
                        &mut tile_data[dst_offset..dst_offset + pixels * dst_bpp],
                        pixels,
                    )?;
                }
                Ok::<(), BufferError>(())
            })?;
        }

        let written = writable.from_level(level).intersect(&self.extent);
        self.drop_mips_above(level, written);
        log::trace!("stored {writable:?} at level {level}");
        Ok(written)
    }

    fn tile_for_write(&self, coord: TileCoord) -> Result<Arc<Tile>, BufferError> {
        if coord.level > 0 {
            if let Some(tile) = self.tile_for_read(coord)? {
                return Ok(tile);
            }
        }
        let tile = self
            .tiles()
            .entry(coord)
            .or_insert_with(|| Arc::new(Tile::new(coord, self.format, self.grid.tile_edge())))
            .clone();
        Ok(tile)
    }

    /// Existing tile, or for levels above 0 a tile generated by 2x2 box
    /// averaging the level below when any finer content exists under it.
    fn tile_for_read(&self, coord: TileCoord) -> Result<Option<Arc<Tile>>, BufferError> {
        if let Some(tile) = self.tile(coord) {
            return Ok(Some(tile));
        }
        if coord.level == 0 || !self.has_finer_content(coord) {
            return Ok(None);
        }

        let edge = self.grid.tile_edge() as i32;
        let tile_rect = self.grid.tile_rect(coord.tile_x, coord.tile_y);
        let child_rect = Rect::new(tile_rect.x * 2, tile_rect.y * 2, edge * 2, edge * 2);
        let child_level = coord.level - 1;
        let mut child = vec![0u8; child_rect.area() as usize * PixelFormat::RgbaF32.bytes_per_pixel()];
        self.read_level(
            child_level,
            child_rect,
            PixelFormat::RgbaF32,
            1.0,
            AbyssPolicy::Clear,
            &mut child,
        )?;

        let child_stride = (edge * 2) as usize;
        let mut averaged = vec![0u8; self.grid.tile_pixels() * PixelFormat::RgbaF32.bytes_per_pixel()];
        for (index, pixel) in averaged
            .chunks_exact_mut(PixelFormat::RgbaF32.bytes_per_pixel())
            .enumerate()
        {
            let x = index % edge as usize;
            let y = index / edge as usize;
            let mut sum = [0f32; 4];
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let child_index = (y * 2 + dy) * child_stride + x * 2 + dx;
                let offset = child_index * 16;
                let rgba = PixelFormat::RgbaF32.decode_rgba(&child[offset..offset + 16]);
                for channel in 0..4 {
                    sum[channel] += rgba[channel];
                }
            }
            PixelFormat::RgbaF32.encode_rgba(sum.map(|value| value * 0.25), pixel);
        }

        let tile = Arc::new(Tile::new(coord, self.format, self.grid.tile_edge()));
        tile.write_transient(|data| {
            convert_pixels(
                PixelFormat::RgbaF32,
                &averaged,
                self.format,
                data,
                self.grid.tile_pixels(),
            )
        })?;
        tile.clear_dirty();
        log::trace!("generated mip tile {coord:?}");
        Ok(Some(self.tiles().entry(coord).or_insert(tile).clone()))
    }

    /// Whether any tile exists below `coord` at a finer level. Walks the
    /// child coordinates, unless that would visit more cells than the map
    /// holds, in which case the map is scanned instead.
    fn has_finer_content(&self, coord: TileCoord) -> bool {
        let tiles = self.tiles();
        let descendants = 4u64.saturating_pow(u32::from(coord.level));
        if descendants <= tiles.len() as u64 {
            return has_child_tiles(&tiles, coord);
        }
        let grid = self.grid;
        let target = footprint(grid, coord);
        tiles.keys().any(|existing| {
            existing.level < coord.level && footprint(grid, *existing).intersects(&target)
        })
    }

    fn drop_mips_above(&self, level: u8, written: Rect) {
        if written.is_empty() {
            return;
        }
        let grid = self.grid;
        self.tiles().retain(|coord, _| {
            coord.level <= level || !footprint(grid, *coord).intersects(&written)
        });
    }

    fn tiles(&self) -> MutexGuard<'_, HashMap<TileCoord, Arc<Tile>>> {
        self.tiles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn has_child_tiles(tiles: &HashMap<TileCoord, Arc<Tile>>, coord: TileCoord) -> bool {
    if coord.level == 0 {
        return false;
    }
    [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().any(|(dx, dy)| {
        let child = TileCoord::new(coord.tile_x * 2 + dx, coord.tile_y * 2 + dy, coord.level - 1);
        tiles.contains_key(&child) || has_child_tiles(tiles, child)
    })
}

/// Level-0 area covered by a tile.
fn footprint(grid: TileGrid, coord: TileCoord) -> Rect {
    grid.tile_rect(coord.tile_x, coord.tile_y)
        .from_level(coord.level)
}

fn check_level(level: u8) -> Result<(), BufferError> {
    if level > MAX_LEVEL {
        return Err(BufferError::InvalidLevel(level));
    }
    Ok(())
}

fn scaled_len(length: i32, scale: f64) -> usize {
    if length <= 0 {
        return 0;
    }
    if scale == 1.0 {
        return length as usize;
    }
    (length as f64 * scale).ceil().max(1.0) as usize
}

fn sample_offset(index: usize, scale: f64, length: i32) -> i32 {
    if scale == 1.0 {
        return index as i32;
    }
    let offset = ((index as f64 + 0.5) / scale).floor() as i32;
    offset.clamp(0, (length - 1).max(0))
}

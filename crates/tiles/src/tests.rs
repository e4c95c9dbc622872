use model::{AbyssPolicy, AccessMode, PixelFormat, Rect, TileCoord};
use test_log::test;

use super::*;
use crate::test_helpers::{pattern_bytes, pattern_pixel, rgba_at, write_pattern};

fn buffer(extent: Rect, tile_edge: u32) -> TiledBuffer {
    TiledBuffer::new(
        extent,
        TiledBufferConfig {
            tile_edge,
            format: PixelFormat::RgbaF32,
            abyss: AbyssPolicy::Clamp,
        },
    )
    .expect("TiledBuffer::new")
}

fn get_rgba(buffer: &TiledBuffer, rect: Rect, level: u8, scale: f64, abyss: AbyssPolicy) -> Vec<u8> {
    let (width, height) = TiledBuffer::output_size(rect, level, scale);
    let mut pixels = vec![0u8; width * height * 16];
    buffer
        .get(rect, level, PixelFormat::RgbaF32, scale, abyss, &mut pixels)
        .expect("TiledBuffer::get");
    pixels
}

#[test]
fn clamp_abyss_fills_border_with_edge_pixels() {
    let extent = Rect::new(0, 0, 100, 100);
    let buffer = buffer(extent, 16);
    write_pattern(&buffer, extent).expect("write pattern");

    let request = Rect::new(-5, -5, 20, 20);
    let pixels = get_rgba(&buffer, request, 0, 1.0, AbyssPolicy::Clamp);

    for j in 0..20 {
        for i in 0..20 {
            let expected_x = (i - 5).clamp(0, 99);
            let expected_y = (j - 5).clamp(0, 99);
            assert_eq!(
                rgba_at(&pixels, 20, i, j),
                pattern_pixel(expected_x, expected_y),
                "pixel ({i}, {j})"
            );
        }
    }
    for j in 5..20 {
        for i in 5..20 {
            assert_eq!(rgba_at(&pixels, 20, i, j), pattern_pixel(i - 5, j - 5));
        }
    }
}

#[test]
fn clamp_uses_last_pixel_inclusive_on_far_edge() {
    let extent = Rect::new(0, 0, 100, 100);
    let buffer = buffer(extent, 16);
    write_pattern(&buffer, extent).expect("write pattern");

    let pixels = get_rgba(&buffer, Rect::new(98, 98, 4, 4), 0, 1.0, AbyssPolicy::Clamp);

    assert_eq!(rgba_at(&pixels, 4, 1, 1), pattern_pixel(99, 99));
    assert_eq!(rgba_at(&pixels, 4, 3, 3), pattern_pixel(99, 99));
    assert_eq!(rgba_at(&pixels, 4, 0, 3), pattern_pixel(98, 99));
}

#[test]
fn none_abyss_rejects_requests_outside_extent() {
    let buffer = buffer(Rect::new(0, 0, 100, 100), 16);
    let mut pixels = vec![0u8; 20 * 20 * 16];

    let error = buffer
        .get(
            Rect::new(-5, -5, 20, 20),
            0,
            PixelFormat::RgbaF32,
            1.0,
            AbyssPolicy::None,
            &mut pixels,
        )
        .expect_err("outside extent");

    assert_eq!(
        error,
        BufferError::InvalidRegion {
            rect: Rect::new(-5, -5, 20, 20),
            reason: InvalidRegionReason::OutsideExtent,
        }
    );
}

#[test]
fn clear_abyss_reads_zero_outside_extent() {
    let extent = Rect::new(0, 0, 8, 8);
    let buffer = buffer(extent, 4);
    write_pattern(&buffer, extent).expect("write pattern");

    let pixels = get_rgba(&buffer, Rect::new(6, 6, 4, 4), 0, 1.0, AbyssPolicy::Clear);

    assert_eq!(rgba_at(&pixels, 4, 1, 1), pattern_pixel(7, 7));
    assert_eq!(rgba_at(&pixels, 4, 2, 1), [0.0; 4]);
    assert_eq!(rgba_at(&pixels, 4, 0, 3), [0.0; 4]);
}

#[test]
fn empty_rect_is_invalid_region() {
    let buffer = buffer(Rect::new(0, 0, 8, 8), 4);
    let error = buffer
        .set(Rect::new(0, 0, 0, 4), 0, PixelFormat::RgbaF32, &[])
        .expect_err("empty rect");
    assert!(matches!(
        error,
        BufferError::InvalidRegion {
            reason: InvalidRegionReason::Empty,
            ..
        }
    ));
}

#[test]
fn unwritten_cells_read_zero_without_allocating() {
    let buffer = buffer(Rect::new(0, 0, 64, 64), 16);
    let pixels = get_rgba(&buffer, Rect::new(0, 0, 64, 64), 0, 1.0, AbyssPolicy::Clamp);

    assert!(pixels.iter().all(|byte| *byte == 0));
    assert_eq!(buffer.tile_count(), 0);
}

#[test]
fn set_clips_to_extent_and_marks_touched_tiles_dirty() {
    let buffer = buffer(Rect::new(0, 0, 40, 40), 16);
    let rect = Rect::new(30, 30, 20, 20);

    let written = buffer
        .set(rect, 0, PixelFormat::RgbaF32, &pattern_bytes(rect))
        .expect("set");

    assert_eq!(written, Rect::new(30, 30, 10, 10));
    assert_eq!(
        buffer.dirty_tiles(),
        vec![
            TileCoord::new(1, 1, 0),
            TileCoord::new(2, 1, 0),
            TileCoord::new(1, 2, 0),
            TileCoord::new(2, 2, 0),
        ]
    );
    buffer.clear_dirty();
    assert!(buffer.dirty_tiles().is_empty());
}

#[test]
fn set_rejects_mismatched_data_length() {
    let buffer = buffer(Rect::new(0, 0, 8, 8), 4);
    let error = buffer
        .set(Rect::new(0, 0, 2, 2), 0, PixelFormat::RgbaU8, &[0u8; 15])
        .expect_err("short data");
    assert_eq!(
        error,
        BufferError::BufferLength {
            expected: 16,
            actual: 15
        }
    );
}

#[test]
fn stored_u8_data_converts_on_read() {
    let buffer = buffer(Rect::new(0, 0, 4, 4), 4);
    let rect = Rect::new(1, 1, 2, 1);
    buffer
        .set(rect, 0, PixelFormat::RgbU8, &[255, 0, 51, 0, 255, 102])
        .expect("set");

    let pixels = buffer.read(rect, PixelFormat::RgbaU8).expect("read");

    assert_eq!(pixels, vec![255, 0, 51, 255, 0, 255, 102, 255]);
}

#[test]
fn level_one_reads_box_averaged_mip() {
    let extent = Rect::new(0, 0, 8, 8);
    let buffer = buffer(extent, 4);
    write_pattern(&buffer, extent).expect("write pattern");

    let pixels = get_rgba(&buffer, extent, 1, 1.0, AbyssPolicy::Clamp);

    for y in 0..4 {
        for x in 0..4 {
            let mut expected = [0f32; 4];
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let sample = pattern_pixel(x * 2 + dx, y * 2 + dy);
                for channel in 0..4 {
                    expected[channel] += sample[channel] / 4.0;
                }
            }
            let actual = rgba_at(&pixels, 4, x, y);
            for channel in 0..4 {
                assert!((actual[channel] - expected[channel]).abs() < 1e-6);
            }
        }
    }
    assert!(buffer.tile(TileCoord::new(0, 0, 1)).is_some());
}

#[test]
fn mip_generation_only_where_finer_tiles_exist() {
    let buffer = buffer(Rect::new(0, 0, 64, 64), 4);
    let written = Rect::new(0, 0, 16, 16);
    write_pattern(&buffer, written).expect("write pattern");
    assert_eq!(buffer.tile_count(), 16);

    let empty = get_rgba(&buffer, Rect::new(16, 16, 16, 16), 2, 1.0, AbyssPolicy::Clamp);
    assert!(empty.iter().all(|byte| *byte == 0));
    assert!(buffer.tile(TileCoord::new(1, 1, 2)).is_none());

    let _ = get_rgba(&buffer, written, 2, 1.0, AbyssPolicy::Clamp);
    assert!(buffer.tile(TileCoord::new(0, 0, 2)).is_some());
    assert!(buffer.tile(TileCoord::new(1, 1, 1)).is_some());
}

#[test]
fn writing_level_zero_drops_stale_mips() {
    let extent = Rect::new(0, 0, 8, 8);
    let buffer = buffer(extent, 4);
    write_pattern(&buffer, extent).expect("write pattern");
    let _ = get_rgba(&buffer, extent, 1, 1.0, AbyssPolicy::Clamp);
    assert!(buffer.tile(TileCoord::new(0, 0, 1)).is_some());

    let white: Vec<u8> = [1.0f32; 4]
        .iter()
        .flat_map(|value| value.to_ne_bytes())
        .collect();
    buffer
        .set(Rect::new(0, 0, 1, 1), 0, PixelFormat::RgbaF32, &white)
        .expect("set");

    assert!(buffer.tile(TileCoord::new(0, 0, 1)).is_none());
    let mip = get_rgba(&buffer, Rect::new(0, 0, 2, 2), 1, 1.0, AbyssPolicy::Clamp);
    let expected_red = (1.0 + pattern_pixel(1, 0)[0] + pattern_pixel(0, 1)[0] + pattern_pixel(1, 1)[0]) / 4.0;
    assert!((rgba_at(&mip, 1, 0, 0)[0] - expected_red).abs() < 1e-6);
}

#[test]
fn scale_two_point_samples_each_pixel_twice() {
    let extent = Rect::new(0, 0, 8, 8);
    let buffer = buffer(extent, 4);
    write_pattern(&buffer, extent).expect("write pattern");

    let pixels = get_rgba(&buffer, Rect::new(0, 0, 4, 4), 0, 2.0, AbyssPolicy::Clamp);

    assert_eq!(pixels.len(), 8 * 8 * 16);
    assert_eq!(rgba_at(&pixels, 8, 3, 5), pattern_pixel(1, 2));
    assert_eq!(rgba_at(&pixels, 8, 7, 7), pattern_pixel(3, 3));
}

#[test]
fn invalid_scale_is_rejected() {
    let buffer = buffer(Rect::new(0, 0, 8, 8), 4);
    let mut pixels = vec![0u8; 16];
    let error = buffer
        .get(
            Rect::new(0, 0, 1, 1),
            0,
            PixelFormat::RgbaF32,
            0.0,
            AbyssPolicy::Clamp,
            &mut pixels,
        )
        .expect_err("zero scale");
    assert_eq!(error, BufferError::InvalidScale(0.0));
}

#[test]
fn evict_drops_only_fully_covered_tiles() {
    let extent = Rect::new(0, 0, 32, 32);
    let buffer = buffer(extent, 16);
    write_pattern(&buffer, extent).expect("write pattern");
    assert_eq!(buffer.tile_count(), 4);

    let removed = buffer.evict(Rect::new(0, 0, 20, 32));

    assert_eq!(removed, 2);
    assert!(buffer.tile(TileCoord::new(0, 0, 0)).is_none());
    assert!(buffer.tile(TileCoord::new(1, 0, 0)).is_some());
}

#[test]
fn tile_locked_by_caller_is_reported_through_buffer_tile_handle() {
    let extent = Rect::new(0, 0, 4, 4);
    let buffer = buffer(extent, 4);
    write_pattern(&buffer, extent).expect("write pattern");
    let tile = buffer.tile(TileCoord::new(0, 0, 0)).expect("tile");
    let owner = TileLockOwner::next();

    tile.lock(owner).expect("lock");
    tile.with_data_mut(owner, |data| data[..16].fill(0))
        .expect("mutate under lock");
    tile.unlock(owner).expect("unlock");

    let pixels = buffer.read(Rect::new(0, 0, 1, 1), PixelFormat::RgbaF32).expect("read");
    assert_eq!(rgba_at(&pixels, 1, 0, 0), [0.0; 4]);
}

#[test]
fn lock_holder_can_use_buffer_api_while_holding_tile() {
    let extent = Rect::new(0, 0, 8, 8);
    let buffer = buffer(extent, 4);
    write_pattern(&buffer, extent).expect("write pattern");
    let tile = buffer.tile(TileCoord::new(0, 0, 0)).expect("tile");
    let owner = TileLockOwner::next();
    tile.lock(owner).expect("lock");

    let pixels = buffer.read(Rect::new(0, 0, 2, 2), PixelFormat::RgbaF32).expect("read");
    assert_eq!(pixels, pattern_bytes(Rect::new(0, 0, 2, 2)));
    buffer
        .set(Rect::new(1, 1, 1, 1), 0, PixelFormat::RgbaF32, &[0u8; 16])
        .expect("set");
    let copied = copy_through_iterator(&buffer, Rect::new(0, 0, 4, 4), &buffer, Rect::new(4, 4, 4, 4));

    assert_eq!(copied, 16);
    assert_eq!(tile.lock_depth(), 1);
    tile.unlock(owner).expect("unlock");
    let moved = buffer.read(Rect::new(5, 5, 1, 1), PixelFormat::RgbaF32).expect("read");
    assert_eq!(rgba_at(&moved, 1, 0, 0), [0.0; 4]);
}

#[test]
fn write_iterator_round_trips_through_get() {
    let extent = Rect::new(0, 0, 70, 50);
    let target = buffer(extent, 16);
    let roi = Rect::new(3, 2, 60, 45);

    let mut iterator = BufferIterator::new(
        &target,
        roi,
        0,
        PixelFormat::RgbaF32,
        AccessMode::WRITE,
        AbyssPolicy::None,
    )
    .expect("iterator");
    let output = ParticipantIndex::FIRST;
    let mut processed = 0;
    while iterator.next().expect("next") {
        let chunk = iterator.chunk_rect(output);
        let samples = iterator.data_f32_mut(output);
        for (index, pixel) in samples.chunks_exact_mut(4).enumerate() {
            let x = chunk.x + index as i32 % chunk.width;
            let y = chunk.y + index as i32 / chunk.width;
            pixel.copy_from_slice(&pattern_pixel(x, y));
        }
        processed += iterator.length();
    }

    assert_eq!(processed as u64, roi.area());
    let pixels = target.read(roi, PixelFormat::RgbaF32).expect("read");
    assert_eq!(pixels, pattern_bytes(roi));
}

fn copy_through_iterator(
    source: &TiledBuffer,
    source_roi: Rect,
    target: &TiledBuffer,
    target_roi: Rect,
) -> usize {
    let mut iterator = BufferIterator::new(
        source,
        source_roi,
        0,
        PixelFormat::RgbaF32,
        AccessMode::READ,
        AbyssPolicy::Clamp,
    )
    .expect("iterator");
    let input = ParticipantIndex::FIRST;
    let output = iterator
        .add(
            target,
            target_roi,
            0,
            PixelFormat::RgbaF32,
            AccessMode::WRITE,
            AbyssPolicy::Clamp,
        )
        .expect("add target");
    let mut processed = 0;
    while iterator.next().expect("next") {
        for (participant, grid) in [(input, source.grid()), (output, target.grid())] {
            let chunk = iterator.chunk_rect(participant);
            assert_eq!(
                grid.tile_index(chunk.x),
                grid.tile_index(chunk.right() - 1),
                "chunk {chunk:?} straddles a column boundary"
            );
            assert_eq!(
                grid.tile_index(chunk.y),
                grid.tile_index(chunk.bottom() - 1),
                "chunk {chunk:?} straddles a row boundary"
            );
        }
        let (pixels, stored) = iterator.data_pair(input, output).expect("distinct participants");
        stored.copy_from_slice(pixels);
        processed += iterator.length();
    }
    processed
}

#[test]
fn misaligned_tilings_process_same_pixels_as_single_buffer() {
    let extent = Rect::new(0, 0, 100, 80);
    let source = buffer(extent, 16);
    write_pattern(&source, extent).expect("write pattern");
    let target = buffer(extent, 64);
    let roi = Rect::new(0, 0, 100, 80);

    let mut single = BufferIterator::new(
        &source,
        roi,
        0,
        PixelFormat::RgbaF32,
        AccessMode::READ,
        AbyssPolicy::Clamp,
    )
    .expect("single");
    let mut single_total = 0;
    while single.next().expect("next") {
        single_total += single.length();
    }

    let paired_total = copy_through_iterator(&source, roi, &target, roi);

    assert_eq!(paired_total, single_total);
    assert_eq!(paired_total as u64, roi.area());
    assert_eq!(
        target.read(roi, PixelFormat::RgbaF32).expect("target"),
        source.read(roi, PixelFormat::RgbaF32).expect("source")
    );
}

#[test]
fn offset_rois_degrade_to_sub_tile_chunks() {
    let extent = Rect::new(0, 0, 64, 64);
    let source = buffer(extent, 16);
    write_pattern(&source, extent).expect("write pattern");
    let target = buffer(extent, 64);

    let processed = copy_through_iterator(
        &source,
        Rect::new(3, 5, 40, 30),
        &target,
        Rect::new(0, 0, 40, 30),
    );

    assert_eq!(processed, 40 * 30);
    let copied = target
        .read(Rect::new(0, 0, 40, 30), PixelFormat::RgbaF32)
        .expect("read");
    for y in 0..30 {
        for x in 0..40 {
            assert_eq!(rgba_at(&copied, 40, x, y), pattern_pixel(x + 3, y + 5));
        }
    }
}

#[test]
fn iterator_reads_abyss_through_general_path() {
    let extent = Rect::new(0, 0, 16, 16);
    let source = buffer(extent, 8);
    write_pattern(&source, extent).expect("write pattern");
    let target = buffer(Rect::new(0, 0, 20, 20), 8);

    let processed = copy_through_iterator(
        &source,
        Rect::new(-2, -2, 20, 20),
        &target,
        Rect::new(0, 0, 20, 20),
    );

    assert_eq!(processed, 400);
    let copied = target
        .read(Rect::new(0, 0, 20, 20), PixelFormat::RgbaF32)
        .expect("read");
    assert_eq!(rgba_at(&copied, 20, 0, 0), pattern_pixel(0, 0));
    assert_eq!(rgba_at(&copied, 20, 19, 10), pattern_pixel(15, 8));
}

#[test]
fn participants_at_different_levels_share_chunk_geometry() {
    let extent = Rect::new(0, 0, 32, 32);
    let source = buffer(extent, 8);
    write_pattern(&source, extent).expect("write pattern");
    let target = buffer(Rect::new(0, 0, 16, 16), 8);

    let mut iterator = BufferIterator::new(
        &source,
        extent,
        1,
        PixelFormat::RgbaF32,
        AccessMode::READ,
        AbyssPolicy::None,
    )
    .expect("iterator");
    let input = ParticipantIndex::FIRST;
    let output = iterator
        .add(
            &target,
            Rect::new(0, 0, 16, 16),
            0,
            PixelFormat::RgbaF32,
            AccessMode::WRITE,
            AbyssPolicy::None,
        )
        .expect("add");
    while iterator.next().expect("next") {
        assert_eq!(iterator.chunk_rect(input), iterator.chunk_rect(output));
        let pixels = iterator.data(input).to_vec();
        iterator.data_mut(output).copy_from_slice(&pixels);
    }

    let expected = get_rgba(&source, extent, 1, 1.0, AbyssPolicy::None);
    assert_eq!(
        target
            .read(Rect::new(0, 0, 16, 16), PixelFormat::RgbaF32)
            .expect("read"),
        expected
    );
}

#[test]
fn read_write_participant_updates_in_place() {
    let extent = Rect::new(0, 0, 24, 24);
    let buffer = buffer(extent, 16);
    write_pattern(&buffer, extent).expect("write pattern");

    let mut iterator = BufferIterator::new(
        &buffer,
        extent,
        0,
        PixelFormat::RgbaF32,
        AccessMode::READ_WRITE,
        AbyssPolicy::None,
    )
    .expect("iterator");
    let pixels = ParticipantIndex::FIRST;
    while iterator.next().expect("next") {
        for sample in iterator.data_f32_mut(pixels).chunks_exact_mut(4) {
            sample[0] = 1.0 - sample[0];
        }
    }

    let result = buffer.read(extent, PixelFormat::RgbaF32).expect("read");
    assert_eq!(rgba_at(&result, 24, 5, 7)[0], 1.0 - pattern_pixel(5, 7)[0]);
    assert_eq!(rgba_at(&result, 24, 23, 23)[1], pattern_pixel(23, 23)[1]);
}

#[test]
fn data_pair_needs_two_distinct_participants() {
    let extent = Rect::new(0, 0, 4, 4);
    let source = buffer(extent, 4);
    let target = buffer(extent, 4);
    write_pattern(&source, extent).expect("write pattern");
    let mut iterator = BufferIterator::new(
        &source,
        extent,
        0,
        PixelFormat::RgbaF32,
        AccessMode::READ,
        AbyssPolicy::None,
    )
    .expect("iterator");
    let output = iterator
        .add(&target, extent, 0, PixelFormat::RgbaF32, AccessMode::WRITE, AbyssPolicy::None)
        .expect("add target");
    assert!(iterator.next().expect("next"));

    assert!(iterator.data_pair(output, output).is_none());
    let (stored, pixels) = iterator
        .data_pair(output, ParticipantIndex::FIRST)
        .expect("reverse order");
    assert_eq!(stored.len(), pixels.len());
    let (pixels, stored) = iterator
        .data_pair(ParticipantIndex::FIRST, output)
        .expect("forward order");
    stored.copy_from_slice(pixels);
    iterator.finish().expect("finish");

    assert_eq!(target.read(extent, PixelFormat::RgbaF32).expect("read"), pattern_bytes(extent));
}

#[test]
fn seventh_participant_overflows() {
    let buffer = buffer(Rect::new(0, 0, 8, 8), 4);
    let roi = Rect::new(0, 0, 8, 8);
    let mut iterator = BufferIterator::new(
        &buffer,
        roi,
        0,
        PixelFormat::RgbaF32,
        AccessMode::READ,
        AbyssPolicy::None,
    )
    .expect("iterator");
    for _ in 1..MAX_PARTICIPANTS {
        iterator
            .add(&buffer, roi, 0, PixelFormat::YF32, AccessMode::READ, AbyssPolicy::None)
            .expect("within capacity");
    }

    let error = iterator
        .add(&buffer, roi, 0, PixelFormat::YF32, AccessMode::READ, AbyssPolicy::None)
        .expect_err("seventh participant");

    assert_eq!(error, IteratorError::Overflow { max: 6 });
    assert_eq!(iterator.participant_count(), MAX_PARTICIPANTS);
}

#[test]
fn mismatched_participant_size_is_invalid_region() {
    let buffer = buffer(Rect::new(0, 0, 8, 8), 4);
    let mut iterator = BufferIterator::new(
        &buffer,
        Rect::new(0, 0, 8, 8),
        0,
        PixelFormat::RgbaF32,
        AccessMode::READ,
        AbyssPolicy::None,
    )
    .expect("iterator");

    let error = iterator
        .add(
            &buffer,
            Rect::new(0, 0, 4, 8),
            0,
            PixelFormat::RgbaF32,
            AccessMode::WRITE,
            AbyssPolicy::None,
        )
        .expect_err("size mismatch");

    assert!(matches!(
        error,
        IteratorError::InvalidRegion {
            reason: InvalidRegionReason::SizeMismatch,
            ..
        }
    ));
}

fn fill_first_chunk(target: &TiledBuffer) -> BufferIterator<'_> {
    let mut iterator = BufferIterator::new(
        target,
        Rect::new(0, 0, 16, 16),
        0,
        PixelFormat::RgbaF32,
        AccessMode::WRITE,
        AbyssPolicy::None,
    )
    .expect("iterator");
    assert!(iterator.next().expect("first chunk"));
    iterator
        .data_f32_mut(ParticipantIndex::FIRST)
        .fill(1.0);
    iterator
}

#[test]
fn stop_discards_unflushed_chunk() {
    let target = buffer(Rect::new(0, 0, 16, 16), 16);
    let iterator = fill_first_chunk(&target);

    iterator.stop();

    assert_eq!(target.tile_count(), 0);
}

#[test]
fn drop_flushes_last_chunk() {
    let target = buffer(Rect::new(0, 0, 16, 16), 16);
    let iterator = fill_first_chunk(&target);

    drop(iterator);

    let pixels = target
        .read(Rect::new(15, 15, 1, 1), PixelFormat::RgbaF32)
        .expect("read");
    assert_eq!(rgba_at(&pixels, 1, 0, 0), [1.0; 4]);
}

#[test]
fn finish_flushes_and_reports() {
    let target = buffer(Rect::new(0, 0, 16, 16), 16);
    let iterator = fill_first_chunk(&target);

    iterator.finish().expect("finish");

    assert_eq!(target.tile_count(), 1);
}

#[test]
fn participants_cannot_join_after_start() {
    let target = buffer(Rect::new(0, 0, 16, 16), 16);
    let mut iterator = fill_first_chunk(&target);
    let error = iterator
        .add(
            &target,
            Rect::new(0, 0, 16, 16),
            0,
            PixelFormat::RgbaF32,
            AccessMode::READ,
            AbyssPolicy::None,
        )
        .expect_err("late add");
    assert_eq!(error, IteratorError::AlreadyStarted);
    iterator.stop();
}

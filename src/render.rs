use crate::types::Bar;

const MAX_WIDTH: f64 = 80.0;

/// Draws a bar as a three-line strip: pieces in order from the left, the
/// waste at the right end shown with `~`.
pub fn render_bar(bar: &Bar) -> String {
    let total = f64::max(bar.chosen_length as f64, bar.occupied);
    if total <= 0.0 {
        return String::new();
    }
    let scale = MAX_WIDTH / total;
    let grid_w = (total * scale).round() as usize;

    let mut grid = vec![vec![' '; grid_w + 1]; 3];
    draw_segment(&mut grid, 0, grid_w, '-');

    let cut_count = bar.piece_lengths.len().saturating_sub(1);
    let pieces_total: f64 = bar.piece_lengths.iter().sum();
    let margin = if cut_count > 0 {
        (bar.occupied - pieces_total) / cut_count as f64
    } else {
        0.0
    };

    let mut x = 0.0;
    for &length in &bar.piece_lengths {
        let sx = (x * scale).round() as usize;
        let ex = ((x + length) * scale).round() as usize;
        draw_segment(&mut grid, sx, ex, '-');
        label(&mut grid, sx, ex, &format!("{}", length.round()));
        x += length + margin;
    }

    let end = (bar.occupied * scale).round() as usize;
    if end < grid_w {
        draw_segment(&mut grid, end, grid_w, '~');
        if bar.waste > 0.0 {
            label(&mut grid, end, grid_w, &format!("{}", bar.waste.round()));
        }
    }

    let mut result = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}

#[allow(clippy::needless_range_loop)]
fn draw_segment(grid: &mut [Vec<char>], sx: usize, ex: usize, edge: char) {
    let cols = grid[0].len();
    let ex = ex.min(cols - 1);
    for i in sx..=ex {
        for row in [0, 2] {
            if grid[row][i] != '+' {
                grid[row][i] = edge;
            }
        }
    }
    for x in [sx, ex] {
        grid[0][x] = '+';
        grid[1][x] = '|';
        grid[2][x] = '+';
    }
}

fn label(grid: &mut [Vec<char>], sx: usize, ex: usize, text: &str) {
    let chars: Vec<char> = text.chars().collect();
    if ex <= sx + 1 || chars.len() > ex - sx - 1 {
        return;
    }
    let start = sx + 1 + (ex - sx - 1 - chars.len()) / 2;
    for (i, &ch) in chars.iter().enumerate() {
        grid[1][start + i] = ch;
    }
}

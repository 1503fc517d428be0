//! Paginating renderer for the layout blocks, and a minimal PDF writer.
//!
//! Coordinates are millimetres from the top-left corner of an A4 page and
//! are converted to PDF points only when the content stream is written.
//! Text uses the standard Helvetica fonts with WinAnsi encoding, so no font
//! program is embedded.

use super::layout::{self, Align, Block, Font, PdfLayout, RatingRow, TextLine};
use super::ReportInput;
use crate::rubric::RatingLevel;

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_X: f32 = 15.0;
const TOP: f32 = 20.0;
const CONTENT_BOTTOM: f32 = 280.0;
/// Distance of the signature line from the bottom edge.
pub const SIGNATURE_FROM_BOTTOM: f32 = 40.0;
const FOOTER_Y: f32 = 290.0;

const TABLE_FONT: f32 = 8.0;
const TABLE_LINE: f32 = 3.5;
const TABLE_PAD: f32 = 2.0;
/// Cluster, sub-competency, level, comment.
const GRID_COLUMNS: [f32; 4] = [42.0, 76.0, 18.0, 44.0];
const SWATCH: f32 = 4.0;
const PARAGRAPH_LINE: f32 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text {
        x: f32,
        y: f32,
        size: f32,
        font: Font,
        text: String,
    },
    Fill {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        rgb: (u8, u8, u8),
    },
    Stroke {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<Op>,
}

// Helvetica advance widths for 0x20..=0x7E, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

// Helvetica-Bold advance widths for 0x20..=0x7E.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, //
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, //
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, //
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, //
];

/// Accented Latin letters take the width of their base letter.
fn base_letter(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ÿ' => 'y',
        '’' | '‘' => '\'',
        other => other,
    }
}

fn char_width(c: char, font: Font) -> u16 {
    let table = match font {
        Font::Regular => &HELVETICA_WIDTHS,
        Font::Bold => &HELVETICA_BOLD_WIDTHS,
    };
    match c {
        '–' => 556,
        '—' | 'œ' | 'Œ' => 1000,
        '°' => 400,
        '…' => 1000,
        _ => {
            let b = base_letter(c) as u32;
            if (0x20..=0x7E).contains(&b) {
                table[(b - 0x20) as usize]
            } else {
                556
            }
        }
    }
}

/// Width of `text` in millimetres at `size` points.
pub fn text_width(text: &str, size: f32, font: Font) -> f32 {
    let units: u32 = text.chars().map(|c| char_width(c, font) as u32).sum();
    units as f32 / 1000.0 * size * 25.4 / 72.0
}

/// Greedy word wrap to `max_width` mm. Explicit newlines are kept; a word
/// wider than the line is broken by characters.
pub fn wrap(text: &str, size: f32, font: Font, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let mut current = String::new();
        for word in raw.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width(&candidate, size, font) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            for c in word.chars() {
                current.push(c);
                if text_width(&current, size, font) > max_width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn cell_height(lines: usize) -> f32 {
    lines.max(1) as f32 * TABLE_LINE + TABLE_PAD * 2.0
}

/// A grid cluster with its text wrapped to the column widths.
struct GridGroup {
    title_lines: Vec<String>,
    title_h: f32,
    /// Label and comment lines per row.
    cells: Vec<(Vec<String>, Vec<String>)>,
}

impl GridGroup {
    fn measure(title: &str, rows: &[RatingRow]) -> Self {
        let inner = |i: usize| GRID_COLUMNS[i] - 3.0;
        let title_lines = wrap(title, TABLE_FONT, Font::Bold, inner(0));
        let title_h = cell_height(title_lines.len());
        let cells = rows
            .iter()
            .map(|r| {
                (
                    wrap(&r.label, TABLE_FONT, Font::Regular, inner(1)),
                    wrap(&r.comment, TABLE_FONT, Font::Regular, inner(3)),
                )
            })
            .collect();
        Self {
            title_lines,
            title_h,
            cells,
        }
    }

    fn row_lines(&self, i: usize) -> usize {
        let (label, comment) = &self.cells[i];
        label.len().max(comment.len()).max(1)
    }

    fn height(&self) -> f32 {
        (0..self.cells.len())
            .map(|i| cell_height(self.row_lines(i)))
            .sum::<f32>()
            .max(self.title_h)
    }
}

/// The lines of one row drawn on the current page.
struct RowSlice<'a> {
    row: &'a RatingRow,
    index: usize,
    label: std::ops::Range<usize>,
    comment: std::ops::Range<usize>,
    height: f32,
}

struct Paginator {
    pages: Vec<Page>,
    y: f32,
}

impl Paginator {
    fn new() -> Self {
        Self {
            pages: vec![Page::default()],
            y: TOP,
        }
    }

    fn ops(&mut self) -> &mut Vec<Op> {
        let last = self.pages.len() - 1;
        &mut self.pages[last].ops
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = TOP;
    }

    fn at_top(&self) -> bool {
        self.y <= TOP
    }

    /// Moves to a fresh page unless `height` fits below the cursor.
    fn reserve(&mut self, height: f32) {
        if self.y + height > CONTENT_BOTTOM && !self.at_top() {
            self.new_page();
        }
    }

    fn text(&mut self, x: f32, y: f32, size: f32, font: Font, text: &str) {
        if text.is_empty() {
            return;
        }
        self.ops().push(Op::Text {
            x,
            y,
            size,
            font,
            text: text.to_string(),
        });
    }

    fn swatch(&mut self, x: f32, baseline: f32, level: RatingLevel) {
        self.ops().push(Op::Fill {
            x,
            y: baseline - SWATCH / 2.0 - 1.0,
            w: SWATCH,
            h: SWATCH,
            rgb: level.info().rgb,
        });
    }

    fn text_lines(&mut self, lines: &[TextLine]) {
        let height: f32 = lines.iter().map(|l| l.advance).sum();
        self.reserve(height);
        for line in lines {
            let w = text_width(&line.text, line.size, line.font);
            let x = match line.align {
                Align::Left => MARGIN_X,
                Align::Center => (PAGE_WIDTH - w) / 2.0,
                Align::Right => PAGE_WIDTH - MARGIN_X - w,
            };
            let y = self.y;
            self.text(x, y, line.size, line.font, &line.text);
            self.y += line.advance;
        }
    }

    fn legend(&mut self) {
        const XS: [f32; 5] = [15.0, 55.0, 95.0, 125.0, 175.0];
        self.reserve(11.0);
        let y = self.y;
        self.text(MARGIN_X, y, 7.0, Font::Regular, "Légende :");
        self.y += 4.0;
        for (level, x) in RatingLevel::ALL.iter().zip(XS) {
            let y = self.y;
            self.swatch(x, y, *level);
            self.text(x + 6.0, y, 7.0, Font::Regular, level.info().short_label);
        }
        self.y += 7.0;
    }

    fn column_x(i: usize) -> f32 {
        MARGIN_X + GRID_COLUMNS[..i].iter().sum::<f32>()
    }

    /// `keep_with` is the height of the group that must follow the header.
    fn table_header(&mut self, keep_with: f32) {
        const LABELS: [&str; 4] = ["Compétence", "Sous-compétence", "Niveau", "Commentaire"];
        let h = TABLE_LINE + TABLE_PAD * 2.0;
        self.reserve((h + keep_with).min(CONTENT_BOTTOM - TOP));
        for (i, label) in LABELS.iter().enumerate() {
            let x = Self::column_x(i);
            let y = self.y;
            self.ops().push(Op::Fill {
                x,
                y,
                w: GRID_COLUMNS[i],
                h,
                rgb: (230, 230, 230),
            });
            self.ops().push(Op::Stroke {
                x,
                y,
                w: GRID_COLUMNS[i],
                h,
            });
            self.text(x + 1.5, y + TABLE_PAD + 2.6, TABLE_FONT, Font::Bold, label);
        }
        self.y += h;
    }

    /// Draws one cluster as a table. A group that fits on a page is never
    /// split; otherwise it breaks between rows, and a row taller than a page
    /// breaks between lines. The cluster cell is repeated on every page.
    fn grid_group(&mut self, group: &GridGroup, rows: &[RatingRow]) {
        self.reserve(group.height());

        let mut slices: Vec<RowSlice> = Vec::new();
        let mut used = 0.0;
        for (i, row) in rows.iter().enumerate() {
            let (label, comment) = &group.cells[i];
            let lines = group.row_lines(i);
            let mut start = 0;
            while start < lines {
                if slices.is_empty() && self.y + group.title_h > CONTENT_BOTTOM && !self.at_top() {
                    self.new_page();
                }
                let avail = CONTENT_BOTTOM - self.y - used;
                let fit = ((avail - TABLE_PAD * 2.0) / TABLE_LINE + 1e-3).floor().max(0.0) as usize;
                let remaining = lines - start;
                let take = if remaining <= fit {
                    remaining
                } else if cell_height(remaining) > CONTENT_BOTTOM - TOP {
                    fit
                } else {
                    0
                };
                if take == 0 {
                    self.grid_slices(group, &slices);
                    slices.clear();
                    used = 0.0;
                    self.new_page();
                    continue;
                }
                let end = start + take;
                let part = |v: &[String]| start.min(v.len())..end.min(v.len());
                slices.push(RowSlice {
                    row,
                    label: part(label.as_slice()),
                    comment: part(comment.as_slice()),
                    index: i,
                    height: cell_height(take),
                });
                used += cell_height(take);
                start = end;
            }
        }
        self.grid_slices(group, &slices);
    }

    /// Draws the slices that share the current page below the cursor.
    fn grid_slices(&mut self, group: &GridGroup, slices: &[RowSlice]) {
        if slices.is_empty() {
            return;
        }
        let used: f32 = slices.iter().map(|s| s.height).sum();
        let segment_h = used.max(group.title_h);
        let top = self.y;
        self.ops().push(Op::Stroke {
            x: Self::column_x(0),
            y: top,
            w: GRID_COLUMNS[0],
            h: segment_h,
        });
        for (i, line) in group.title_lines.iter().enumerate() {
            let y = top + TABLE_PAD + 2.6 + i as f32 * TABLE_LINE;
            self.text(Self::column_x(0) + 1.5, y, TABLE_FONT, Font::Bold, line);
        }

        let mut y = top;
        for (n, slice) in slices.iter().enumerate() {
            let mut h = slice.height;
            if n + 1 == slices.len() {
                h += segment_h - used;
            }
            for col in 1..4 {
                self.ops().push(Op::Stroke {
                    x: Self::column_x(col),
                    y,
                    w: GRID_COLUMNS[col],
                    h,
                });
            }
            let level = slice.row.level;
            let level_x = Self::column_x(2);
            self.ops().push(Op::Fill {
                x: level_x + 0.3,
                y: y + 0.3,
                w: GRID_COLUMNS[2] - 0.6,
                h: h - 0.6,
                rgb: level.info().rgb,
            });
            let symbol = level.symbol();
            let sw = text_width(symbol, TABLE_FONT, Font::Bold);
            self.text(
                level_x + (GRID_COLUMNS[2] - sw) / 2.0,
                y + h / 2.0 + 1.2,
                TABLE_FONT,
                Font::Bold,
                symbol,
            );
            let (label, comment) = &group.cells[slice.index];
            for (i, line) in label[slice.label.clone()].iter().enumerate() {
                let ly = y + TABLE_PAD + 2.6 + i as f32 * TABLE_LINE;
                self.text(Self::column_x(1) + 1.5, ly, TABLE_FONT, Font::Regular, line);
            }
            for (i, line) in comment[slice.comment.clone()].iter().enumerate() {
                let ly = y + TABLE_PAD + 2.6 + i as f32 * TABLE_LINE;
                self.text(Self::column_x(3) + 1.5, ly, TABLE_FONT, Font::Regular, line);
            }
            y += h;
        }
        self.y = top + segment_h;
    }

    fn list_group(&mut self, title: &str, rows: &[RatingRow]) {
        let comment_width = PAGE_WIDTH - MARGIN_X - 32.0;
        let comments: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                if r.comment.trim().is_empty() {
                    Vec::new()
                } else {
                    wrap(&r.comment, 7.0, Font::Regular, comment_width)
                }
            })
            .collect();
        let height = 5.0
            + rows.len() as f32 * 4.0
            + comments.iter().map(|c| c.len() as f32 * 3.0).sum::<f32>()
            + 4.0;
        self.reserve(height);

        let y = self.y;
        self.text(MARGIN_X, y, 10.0, Font::Bold, title);
        self.y += 5.0;
        for (row, comment) in rows.iter().zip(&comments) {
            let y = self.y;
            self.swatch(20.0, y, row.level);
            let label = format!("{} [{}]", row.label, row.level.symbol());
            self.text(28.0, y, 9.0, Font::Regular, &label);
            self.y += 4.0;
            for line in comment {
                let y = self.y;
                self.text(32.0, y, 7.0, Font::Regular, line);
                self.y += 3.0;
            }
        }
        self.y += 4.0;
    }

    fn paragraph(&mut self, title: &str, body: &str) {
        let lines = wrap(body, 10.0, Font::Regular, PAGE_WIDTH - 2.0 * MARGIN_X);
        // Title never ends a page on its own.
        self.reserve(8.0 + PARAGRAPH_LINE);
        let y = self.y;
        self.text(MARGIN_X, y, 10.0, Font::Bold, title);
        self.y += 8.0;
        for line in &lines {
            if self.y + PARAGRAPH_LINE > CONTENT_BOTTOM {
                self.new_page();
            }
            let y = self.y;
            self.text(MARGIN_X, y, 10.0, Font::Regular, line);
            self.y += PARAGRAPH_LINE;
        }
        self.y += PARAGRAPH_LINE;
    }

    fn signature(&mut self) {
        let pinned = PAGE_HEIGHT - SIGNATURE_FROM_BOTTOM;
        if self.y > pinned - 5.0 {
            self.new_page();
        }
        self.text(
            MARGIN_X,
            pinned,
            10.0,
            Font::Regular,
            "Date et signature du tuteur en entreprise:",
        );
        self.text(
            PAGE_WIDTH - 100.0,
            pinned,
            10.0,
            Font::Regular,
            "Date et signature de l'enseignant:",
        );
        self.ops().push(Op::Stroke {
            x: MARGIN_X,
            y: pinned + 3.0,
            w: 80.0,
            h: 22.0,
        });
        self.ops().push(Op::Stroke {
            x: PAGE_WIDTH - 100.0,
            y: pinned + 3.0,
            w: 85.0,
            h: 22.0,
        });
        self.y = pinned + 25.0;
    }

    /// `next` is the block that follows, kept on the same page as a table header.
    fn block(&mut self, block: &Block, next: Option<&Block>) {
        match block {
            Block::Text(lines) => self.text_lines(lines),
            Block::Legend => self.legend(),
            Block::TableHeader => {
                let keep_with = match next {
                    Some(Block::ClusterGroup { title, rows, .. }) => {
                        GridGroup::measure(title, rows).height()
                    }
                    _ => 0.0,
                };
                self.table_header(keep_with)
            }
            Block::ClusterGroup {
                title,
                rows,
                layout: PdfLayout::Grid,
            } => self.grid_group(&GridGroup::measure(title, rows), rows),
            Block::ClusterGroup {
                title,
                rows,
                layout: PdfLayout::List,
            } => self.list_group(title, rows),
            Block::Paragraph { title, body } => self.paragraph(title, body),
            Block::Signature => self.signature(),
        }
    }

    fn finish(mut self) -> Vec<Page> {
        let total = self.pages.len();
        for (i, page) in self.pages.iter_mut().enumerate() {
            let label = format!("Page {}/{}", i + 1, total);
            let w = text_width(&label, 8.0, Font::Regular);
            page.ops.push(Op::Text {
                x: (PAGE_WIDTH - w) / 2.0,
                y: FOOTER_Y,
                size: 8.0,
                font: Font::Regular,
                text: label,
            });
        }
        self.pages
    }
}

pub fn paginate(blocks: &[Block]) -> Vec<Page> {
    let mut p = Paginator::new();
    for (i, block) in blocks.iter().enumerate() {
        p.block(block, blocks.get(i + 1));
    }
    p.finish()
}

/// WinAnsi byte for `c`, or `?` when the code page has none.
fn win_ansi(c: char) -> u8 {
    let code = c as u32;
    match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ if (0x20..0x7F).contains(&code) || (0xA0..=0xFF).contains(&code) => code as u8,
        '\t' => b' ',
        _ => b'?',
    }
}

/// A PDF literal string; non-ASCII bytes are written as octal escapes.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        match win_ansi(c) {
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\\' => out.push_str("\\\\"),
            b if b < 0x80 => out.push(b as char),
            b => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out.push(')');
    out
}

fn pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

fn content_stream(page: &Page) -> String {
    let mut s = String::new();
    for op in &page.ops {
        match op {
            Op::Fill { x, y, w, h, rgb } => {
                s.push_str(&format!(
                    "{:.3} {:.3} {:.3} rg {:.2} {:.2} {:.2} {:.2} re f\n",
                    rgb.0 as f32 / 255.0,
                    rgb.1 as f32 / 255.0,
                    rgb.2 as f32 / 255.0,
                    pt(*x),
                    pt(PAGE_HEIGHT - y - h),
                    pt(*w),
                    pt(*h)
                ));
            }
            Op::Stroke { x, y, w, h } => {
                s.push_str(&format!(
                    "0 G 0.5 w {:.2} {:.2} {:.2} {:.2} re S\n",
                    pt(*x),
                    pt(PAGE_HEIGHT - y - h),
                    pt(*w),
                    pt(*h)
                ));
            }
            Op::Text {
                x,
                y,
                size,
                font,
                text,
            } => {
                let f = match font {
                    Font::Regular => "F1",
                    Font::Bold => "F2",
                };
                s.push_str(&format!(
                    "0 g BT /{} {:.1} Tf {:.2} {:.2} Td {} Tj ET\n",
                    f,
                    size,
                    pt(*x),
                    pt(PAGE_HEIGHT - y),
                    pdf_string(text)
                ));
            }
        }
    }
    s
}

/// Serializes pages into a PDF file. Object layout: 1 catalog, 2 page tree,
/// 3 and 4 fonts, then a page and its content stream per page, info last.
pub fn write_pdf(pages: &[Page], title: &str) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    let mut offsets: Vec<usize> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    let mut object = |out: &mut Vec<u8>, body: &[u8]| {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", offsets.len()).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    };

    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 5 + 2 * i).collect();
    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    let (w, h) = (pt(PAGE_WIDTH), pt(PAGE_HEIGHT));

    object(&mut out, b"<< /Type /Catalog /Pages 2 0 R >>");
    object(
        &mut out,
        format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()).as_bytes(),
    );
    object(
        &mut out,
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );
    object(
        &mut out,
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
    );
    for (page, id) in pages.iter().zip(&page_ids) {
        object(
            &mut out,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {w:.2} {h:.2}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                id + 1
            )
            .as_bytes(),
        );
        let stream = content_stream(page);
        let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
        body.extend_from_slice(stream.as_bytes());
        body.extend_from_slice(b"endstream");
        object(&mut out, &body);
    }
    object(
        &mut out,
        format!("<< /Producer (pfmpd) /Title {} >>", pdf_string(title)).as_bytes(),
    );

    let info_id = offsets.len();
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in &offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            info_id,
            xref_at
        )
        .as_bytes(),
    );
    out
}

pub fn render(input: &ReportInput, layout: PdfLayout) -> Vec<u8> {
    let blocks = layout::describe(input, layout);
    let pages = paginate(&blocks);
    let title = format!(
        "PFMP {} {} {}",
        input.student.last_name, input.student.first_name, input.period.name
    );
    write_pdf(&pages, &title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures;
    use crate::rubric::{Competences, SUB_COMPETENCY_COUNT};

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn repeated_renders_are_byte_identical() {
        let input = fixtures::scenario();
        assert_eq!(
            render(&input, PdfLayout::Grid),
            render(&input, PdfLayout::Grid)
        );
        assert_eq!(
            render(&input, PdfLayout::List),
            render(&input, PdfLayout::List)
        );
    }

    #[test]
    fn output_is_a_well_formed_pdf_shell() {
        let bytes = render(&fixtures::scenario(), PdfLayout::Grid);
        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        let text = String::from_utf8_lossy(&bytes);
        let xref_at: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|t| t.lines().next())
            .and_then(|n| n.parse().ok())
            .expect("startxref offset");
        assert!(bytes[xref_at..].starts_with(b"xref"));
    }

    #[test]
    fn blank_form_draws_every_level_cell() {
        let input = fixtures::dupont(None);
        let pages = paginate(&layout::describe(&input, PdfLayout::Grid));
        let unrated = RatingLevel::Unrated.info().rgb;
        let cells = pages
            .iter()
            .flat_map(|p| &p.ops)
            .filter(|op| matches!(op, Op::Fill { rgb, w, .. } if *rgb == unrated && *w > SWATCH))
            .count();
        assert_eq!(cells, SUB_COMPETENCY_COUNT);
    }

    #[test]
    fn long_comments_spill_onto_new_pages_and_keep_the_signature() {
        let mut c = Competences::default();
        c.get_mut("cc9_informer_consignes").unwrap().comment = "très long ".repeat(40);
        let mut eval = fixtures::evaluation(c);
        eval.general_comment = (0..80).map(|i| format!("ligne {i}\n")).collect();
        let input = fixtures::dupont(Some(eval));
        let pages = paginate(&layout::describe(&input, PdfLayout::Grid));
        assert!(pages.len() >= 2);

        let pinned = PAGE_HEIGHT - SIGNATURE_FROM_BOTTOM;
        let last = pages.last().unwrap();
        assert!(last.ops.iter().any(|op| matches!(
            op,
            Op::Text { text, y, .. } if text.starts_with("Date et signature du tuteur") && *y == pinned
        )));
        for page in &pages {
            for op in &page.ops {
                if let Op::Text { y, text, .. } = op {
                    if !text.starts_with("Page ") {
                        assert!(*y <= CONTENT_BOTTOM, "{text} at {y} runs off the page");
                    }
                }
            }
        }
        let bytes = write_pdf(&pages, "t");
        assert_eq!(count(&bytes, b"/Type /Page "), pages.len());
    }

    fn assert_within_content(pages: &[Page]) {
        for page in pages {
            for op in &page.ops {
                if let Op::Text { y, text, .. } = op {
                    if !text.starts_with("Page ") {
                        assert!(*y <= CONTENT_BOTTOM, "{text} at {y} runs off the page");
                    }
                }
            }
        }
    }

    #[test]
    fn grid_row_taller_than_a_page_breaks_between_lines() {
        let comment = "commentaire tres detaille ".repeat(200);
        let mut c = Competences::default();
        c.get_mut("cc1_collecter_donnees").unwrap().comment = comment.clone();
        let input = fixtures::dupont(Some(fixtures::evaluation(c)));
        let pages = paginate(&layout::describe(&input, PdfLayout::Grid));
        assert!(pages.len() >= 3);
        assert_within_content(&pages);

        // Every wrapped line is printed, in the comment column.
        let comment_x = Paginator::column_x(3) + 1.5;
        let printed: Vec<&str> = pages
            .iter()
            .flat_map(|p| &p.ops)
            .filter_map(|op| match op {
                Op::Text { x, font: Font::Regular, text, .. } if *x == comment_x => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let expected = wrap(&comment, TABLE_FONT, Font::Regular, GRID_COLUMNS[3] - 3.0);
        assert_eq!(printed, expected);

        // The cluster cell is repeated on each page the row spans.
        let title_pages = pages
            .iter()
            .filter(|p| {
                p.ops
                    .iter()
                    .any(|op| matches!(op, Op::Text { text, .. } if text.starts_with("CC1")))
            })
            .count();
        assert!(title_pages >= 2);
    }

    #[test]
    fn table_header_stays_with_the_first_group() {
        let blocks = layout::describe(&fixtures::scenario(), PdfLayout::Grid);
        let at = blocks
            .iter()
            .position(|b| *b == Block::TableHeader)
            .expect("table header");
        let (title, rows) = match &blocks[at + 1] {
            Block::ClusterGroup { title, rows, .. } => (title.clone(), rows.clone()),
            other => panic!("unexpected block after header: {other:?}"),
        };
        let group_h = GridGroup::measure(&title, &rows).height();
        let header_h = TABLE_LINE + TABLE_PAD * 2.0;
        // Leaves room for the header plus a little less than the group.
        let spacer = TextLine {
            text: String::new(),
            size: 10.0,
            font: Font::Regular,
            align: Align::Left,
            advance: CONTENT_BOTTOM - TOP - header_h - group_h + 1.0,
        };
        let pages = paginate(&[
            Block::Text(vec![spacer]),
            blocks[at].clone(),
            blocks[at + 1].clone(),
        ]);
        let page_of = |needle: &str| {
            pages.iter().position(|p| {
                p.ops
                    .iter()
                    .any(|op| matches!(op, Op::Text { text, .. } if text.starts_with(needle)))
            })
        };
        let first_title_line = wrap(&title, TABLE_FONT, Font::Bold, GRID_COLUMNS[0] - 3.0)
            .into_iter()
            .next()
            .unwrap();
        assert_eq!(page_of("Compétence"), Some(1));
        assert_eq!(page_of(&first_title_line), Some(1));
        assert_within_content(&pages);
    }

    #[test]
    fn wrap_respects_width_and_newlines() {
        let lines = wrap("un deux trois\nquatre", 10.0, Font::Regular, 20.0);
        assert!(lines.len() >= 3);
        assert_eq!(lines.last().map(String::as_str), Some("quatre"));
        for l in &lines {
            assert!(text_width(l, 10.0, Font::Regular) <= 20.0);
        }
    }

    #[test]
    fn accented_text_is_octal_escaped() {
        assert_eq!(pdf_string("Élève (1)"), "(\\311l\\350ve \\(1\\))");
        assert_eq!(pdf_string("A–B"), "(A\\226B)");
    }
}

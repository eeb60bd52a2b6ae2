//! Protected regions of a Markdown note.
//!
//! Rules can opt out of rewriting inside front-matter, fenced blocks and
//! heading lines. Regions are computed on the raw text as half-open byte
//! ranges; a line's range never includes its line terminator.

use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Frontmatter,
    FencedTilde,
    FencedBacktick,
    Heading,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegionKind::Frontmatter => "frontmatter",
            RegionKind::FencedTilde => "tilde fence",
            RegionKind::FencedBacktick => "backtick fence",
            RegionKind::Heading => "heading",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedRegion {
    pub kind: RegionKind,
    pub start: usize,
    pub end: usize,
}

impl ProtectedRegion {
    /// True when `span` lies entirely inside this region.
    pub fn contains(&self, span: &Range<usize>) -> bool {
        self.start <= span.start && span.end <= self.end
    }
}

/// All protected regions of one document, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedRegions {
    pub frontmatter: Vec<ProtectedRegion>,
    pub fenced_tilde: Vec<ProtectedRegion>,
    pub fenced_backtick: Vec<ProtectedRegion>,
    pub headings: Vec<ProtectedRegion>,
}

impl ProtectedRegions {
    pub fn scan(text: &str) -> Self {
        let lines = lines(text);
        Self {
            frontmatter: scan_frontmatter(&lines).into_iter().collect(),
            fenced_tilde: scan_fences(&lines, '~', RegionKind::FencedTilde),
            fenced_backtick: scan_fences(&lines, '`', RegionKind::FencedBacktick),
            headings: scan_headings(&lines),
        }
    }

    pub fn of_kind(&self, kind: RegionKind) -> &[ProtectedRegion] {
        match kind {
            RegionKind::Frontmatter => &self.frontmatter,
            RegionKind::FencedTilde => &self.fenced_tilde,
            RegionKind::FencedBacktick => &self.fenced_backtick,
            RegionKind::Heading => &self.headings,
        }
    }

    /// True when `span` is fully contained in a region of any kind accepted by `ignored`.
    pub fn is_protected(&self, span: &Range<usize>, ignored: impl Fn(RegionKind) -> bool) -> bool {
        [
            RegionKind::Frontmatter,
            RegionKind::FencedTilde,
            RegionKind::FencedBacktick,
            RegionKind::Heading,
        ]
        .into_iter()
        .filter(|kind| ignored(*kind))
        .any(|kind| self.of_kind(kind).iter().any(|r| r.contains(span)))
    }

    pub fn len(&self) -> usize {
        self.frontmatter.len() + self.fenced_tilde.len() + self.fenced_backtick.len() + self.headings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A line's content span, excluding `\n` and a trailing `\r`.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    content: &'a str,
}

impl Line<'_> {
    fn end(&self) -> usize {
        self.start + self.content.len()
    }
}

fn lines(text: &str) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    for raw in text.split_inclusive('\n') {
        let content = raw.strip_suffix('\n').unwrap_or(raw);
        let content = content.strip_suffix('\r').unwrap_or(content);
        out.push(Line { start, content });
        start += raw.len();
    }
    out
}

fn is_dash_fence(line: &Line<'_>) -> bool {
    line.content.trim_end_matches([' ', '\t']) == "---"
}

fn scan_frontmatter(lines: &[Line<'_>]) -> Option<ProtectedRegion> {
    let first = lines.first()?;
    if first.start != 0 || !is_dash_fence(first) {
        return None;
    }
    let closing = lines[1..].iter().find(|line| is_dash_fence(line))?;
    Some(ProtectedRegion {
        kind: RegionKind::Frontmatter,
        start: 0,
        end: closing.end(),
    })
}

/// Strip up to three leading spaces of indentation.
fn unindent(content: &str) -> &str {
    let spaces = content.bytes().take(3).take_while(|b| *b == b' ').count();
    &content[spaces..]
}

fn opens_fence(line: &Line<'_>, fence: char) -> bool {
    unindent(line.content).chars().take_while(|c| *c == fence).count() >= 3
}

fn closes_fence(line: &Line<'_>, fence: char) -> bool {
    let body = unindent(line.content);
    opens_fence(line, fence) && body.chars().all(|c| c == fence || c.is_whitespace())
}

fn scan_fences(lines: &[Line<'_>], fence: char, kind: RegionKind) -> Vec<ProtectedRegion> {
    let mut regions = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        let open = lines[idx];
        if !opens_fence(&open, fence) {
            idx += 1;
            continue;
        }
        let close = lines[idx + 1..]
            .iter()
            .position(|line| closes_fence(line, fence));
        match close {
            Some(offset) => {
                let close_idx = idx + 1 + offset;
                regions.push(ProtectedRegion {
                    kind,
                    start: open.start,
                    end: lines[close_idx].end(),
                });
                idx = close_idx + 1;
            }
            // Unclosed fences protect nothing.
            None => idx += 1,
        }
    }
    regions
}

fn is_heading(content: &str) -> bool {
    let hashes = content.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return false;
    }
    let rest = &content[hashes..];
    let body = rest.trim_start();
    body.len() < rest.len() && !body.trim_end().is_empty()
}

fn scan_headings(lines: &[Line<'_>]) -> Vec<ProtectedRegion> {
    lines
        .iter()
        .filter(|line| is_heading(line.content))
        .map(|line| ProtectedRegion {
            kind: RegionKind::Heading,
            start: line.start,
            end: line.end(),
        })
        .collect()
}

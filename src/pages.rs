use anyhow::{anyhow, bail, Context, Result};
use image::{DynamicImage, ImageFormat};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::types::MangaItem;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Separates the archive path from the entry name in a page reference.
const ARCHIVE_SEPARATOR: &str = "!/";

// Implement natural sorting for filenames
pub fn natural_sort(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek(), b_chars.peek()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a_char), Some(b_char)) => {
                if a_char.is_ascii_digit() && b_char.is_ascii_digit() {
                    let a_num = take_number(&mut a_chars);
                    let b_num = take_number(&mut b_chars);
                    match a_num.cmp(&b_num) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }

                let (Some(a_ch), Some(b_ch)) = (a_chars.next(), b_chars.next()) else {
                    continue;
                };
                match a_ch.to_lowercase().cmp(b_ch.to_lowercase()) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut digits = String::new();
    while let Some(&ch) = chars.peek() {
        if !ch.is_ascii_digit() {
            break;
        }
        digits.push(ch);
        chars.next();
    }
    digits.parse().unwrap_or(u64::MAX)
}

fn natural_sort_paths(a: &Path, b: &Path) -> Ordering {
    let a_name = a.file_name().unwrap_or_else(|| OsStr::new("")).to_string_lossy();
    let b_name = b.file_name().unwrap_or_else(|| OsStr::new("")).to_string_lossy();
    natural_sort(a_name.as_ref(), b_name.as_ref())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_archive_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| ext == "cbz" || ext == "zip")
}

fn is_hidden(path: &Path) -> bool {
    let dotfile = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'));
    dotfile || has_hidden_attribute(path)
}

#[cfg(windows)]
fn has_hidden_attribute(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    path.metadata().is_ok_and(|metadata| {
        metadata.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
    })
}

#[cfg(not(windows))]
fn has_hidden_attribute(_path: &Path) -> bool {
    false
}

fn list_images_in_directory(dir: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && !is_hidden(path) && has_image_extension(path))
        .collect();
    images.sort_by(|a, b| natural_sort_paths(a, b));
    debug!("Found {} images in {}", images.len(), dir.display());
    images
}

/// Page references are strings, so a path that is not valid UTF-8 could never be
/// loaded back. Such pages are skipped.
fn page_reference(path: &Path) -> Option<String> {
    let reference = path.to_str().map(str::to_owned);
    if reference.is_none() {
        warn!("Skipping page with a non UTF-8 path: {}", path.display());
    }
    reference
}

fn list_images_in_archive(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut names = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_file() && has_image_extension(Path::new(entry.name())) {
            names.push(entry.name().to_owned());
        }
    }
    names.sort_by(|a, b| natural_sort(a, b));
    Ok(names)
}

pub fn archive_page_reference(archive: &str, entry: &str) -> String {
    format!("{}{}{}", archive, ARCHIVE_SEPARATOR, entry)
}

/// Finds where the archive path ends in `reference`. Folder names may contain
/// the separator too, so every split point is tried and the first one naming an
/// existing archive wins.
fn split_archive_reference(reference: &str) -> Option<(&Path, &str)> {
    let candidates: Vec<(&str, &str)> = reference
        .match_indices(ARCHIVE_SEPARATOR)
        .map(|(at, sep)| (&reference[..at], &reference[at + sep.len()..]))
        .filter(|(archive, _)| is_archive_file(Path::new(archive)))
        .collect();
    let (archive, entry) = candidates
        .iter()
        .find(|(archive, _)| Path::new(archive).is_file())
        .or_else(|| candidates.first())?;
    Some((Path::new(*archive), *entry))
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A manga plus the page the reader should open on.
#[derive(Debug)]
pub struct OpenedManga {
    pub manga: MangaItem,
    pub start_index: usize,
}

/// Builds a [`MangaItem`] from a folder, a comic archive or a single image.
/// A single image opens every image in its folder, starting on the chosen one.
pub fn open_manga(path: &Path) -> Result<OpenedManga> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", path.display()))?;

    if path.is_dir() {
        let pages: Vec<String> = list_images_in_directory(&path)
            .iter()
            .filter_map(|p| page_reference(p))
            .collect();
        if pages.is_empty() {
            bail!("No images found in directory: {}", path.display());
        }
        info!("Opened directory: {} ({} pages)", path.display(), pages.len());
        return build_manga(&path, pages);
    }

    if is_archive_file(&path) {
        let archive = path
            .to_str()
            .ok_or_else(|| anyhow!("Archive path is not valid UTF-8: {}", path.display()))?;
        let pages: Vec<String> = list_images_in_archive(&path)
            .with_context(|| format!("Failed to read archive: {}", path.display()))?
            .iter()
            .map(|entry| archive_page_reference(archive, entry))
            .collect();
        if pages.is_empty() {
            bail!("No images found in archive: {}", path.display());
        }
        info!("Opened archive: {} ({} pages)", path.display(), pages.len());
        return build_manga(&path, pages);
    }

    if has_image_extension(&path) {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("Image has no parent directory: {}", path.display()))?;
        let mut opened = open_manga(parent)?;
        opened.start_index = opened
            .manga
            .pages()
            .iter()
            .position(|page| Path::new(page) == path)
            .unwrap_or(0);
        return Ok(opened);
    }

    bail!("Unsupported file: {}", path.display())
}

fn build_manga(source: &Path, pages: Vec<String>) -> Result<OpenedManga> {
    let cover = pages[0].clone();
    let manga = MangaItem::new(source.display().to_string(), display_name(source), cover, pages)?;
    Ok(OpenedManga {
        manga,
        start_index: 0,
    })
}

/// Decodes the page behind `reference`.
pub fn load_page(reference: &str) -> Result<DynamicImage> {
    match split_archive_reference(reference) {
        Some((archive, entry)) => load_archive_page(archive, entry)
            .with_context(|| format!("Failed to load {} from {}", entry, archive.display())),
        None => load_image_file(Path::new(reference)),
    }
}

fn load_image_file(path: &Path) -> Result<DynamicImage> {
    let img = image::ImageReader::open(path)
        .with_context(|| format!("Failed to open image file: {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("Failed to determine image format: {}", path.display()))?
        .decode()
        .with_context(|| format!("Failed to decode image: {}", path.display()))?;
    Ok(img)
}

fn load_archive_page(archive_path: &Path, entry: &str) -> Result<DynamicImage> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut file = archive.by_name(entry)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    let format = ImageFormat::from_path(entry)
        .map_err(|_| anyhow!("Unsupported image format: {}", entry))?;
    Ok(image::load_from_memory_with_format(&buffer, format)?)
}

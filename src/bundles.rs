use std::{
    fs,
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::renderers::RenderedOutputs;

/// Rendered outputs keyed by filename, kept in upload order.
#[derive(Debug, Clone, Default)]
pub struct ResultBundle {
    entries: Vec<(String, RenderedOutputs)>,
}

impl ResultBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. A repeated filename replaces the earlier value in place.
    pub fn insert(&mut self, filename: impl Into<String>, outputs: RenderedOutputs) {
        let filename = filename.into();
        match self.entries.iter_mut().find(|(name, _)| *name == filename) {
            Some((_, existing)) => *existing = outputs,
            None => self.entries.push((filename, outputs)),
        }
    }

    pub fn get(&self, filename: &str) -> Option<&RenderedOutputs> {
        self.entries
            .iter()
            .find(|(name, _)| name == filename)
            .map(|(_, outputs)| outputs)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RenderedOutputs)> {
        self.entries
            .iter()
            .map(|(name, outputs)| (name.as_str(), outputs))
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `a.txt` becomes (`a_translated.md`, `a_translated.txt`).
pub fn output_names(filename: &str) -> (String, String) {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    (
        format!("{}_translated.md", stem),
        format!("{}_translated.txt", stem),
    )
}

/// Packs every entry as a Markdown and a plain-text member of a Deflate zip.
pub fn build_archive(results: &ResultBundle) -> Result<Vec<u8>> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (filename, outputs) in results.iter() {
        let (md_name, txt_name) = output_names(filename);
        for (name, body) in [(md_name, &outputs.markdown), (txt_name, &outputs.plaintext)] {
            zout.start_file(name.clone(), opts)
                .with_context(|| format!("start zip file: {}", name))?;
            zout.write_all(body.as_bytes())
                .with_context(|| format!("write zip file: {}", name))?;
        }
    }

    let cursor = zout.finish().context("finish zip")?;
    Ok(cursor.into_inner())
}

/// Writes `<stem>_translated.md` and `.txt` for every entry into `dir`.
pub fn write_individual(results: &ResultBundle, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output dir '{}'", dir.display()))?;

    let mut written = Vec::with_capacity(results.len() * 2);
    for (filename, outputs) in results.iter() {
        let (md_name, txt_name) = output_names(filename);
        for (name, body) in [(md_name, &outputs.markdown), (txt_name, &outputs.plaintext)] {
            let path = dir.join(name);
            fs::write(&path, body)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            written.push(path);
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translators::TranslationOutcome;
    use std::io::Read;
    use zip::ZipArchive;

    fn rendered(text: &str) -> RenderedOutputs {
        RenderedOutputs::render(TranslationOutcome::Translated(text.to_string()), 1)
    }

    fn read_members(bytes: Vec<u8>) -> Vec<(String, String)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut body = String::new();
                file.read_to_string(&mut body).unwrap();
                (file.name().to_string(), body)
            })
            .collect()
    }

    #[test]
    fn output_names_strip_extension() {
        assert_eq!(
            output_names("a.txt"),
            ("a_translated.md".to_string(), "a_translated.txt".to_string())
        );
        assert_eq!(output_names("scene.v2.md").0, "scene.v2_translated.md");
        assert_eq!(output_names("noext").1, "noext_translated.txt");
    }

    #[test]
    fn archive_holds_two_members_per_file_in_order() {
        let mut results = ResultBundle::new();
        let r1 = rendered("Sally: Hello!\nSally: 你好！");
        let r2 = rendered("Pete: Hi!\nPete: 嗨！");
        results.insert("a.txt", r1.clone());
        results.insert("b.md", r2.clone());

        let members = read_members(build_archive(&results).unwrap());
        let names: Vec<&str> = members.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            [
                "a_translated.md",
                "a_translated.txt",
                "b_translated.md",
                "b_translated.txt"
            ]
        );
        assert_eq!(members[0].1, r1.markdown);
        assert_eq!(members[1].1, r1.plaintext);
        assert_eq!(members[2].1, r2.markdown);
        assert_eq!(members[3].1, r2.plaintext);
    }

    #[test]
    fn empty_bundle_is_a_valid_archive() {
        let bytes = build_archive(&ResultBundle::new()).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut results = ResultBundle::new();
        results.insert("a.txt", rendered("A: one"));
        results.insert("b.txt", rendered("B: two"));
        results.insert("a.txt", rendered("A: three"));

        assert_eq!(results.len(), 2);
        assert_eq!(results.filenames().collect::<Vec<_>>(), ["a.txt", "b.txt"]);
        assert_eq!(results.get("a.txt").unwrap().plaintext, "A: three");
    }

    #[test]
    fn write_individual_creates_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let mut results = ResultBundle::new();
        results.insert("scene.txt", rendered("Sally: Hello!"));

        let written = write_individual(&results, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("scene_translated.md")).unwrap(),
            "**Sally:** Hello!"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("scene_translated.txt")).unwrap(),
            "Sally: Hello!"
        );
    }
}

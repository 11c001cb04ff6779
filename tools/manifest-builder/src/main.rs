use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cadence_domain::{DatasetManifest, LabelTable, TrackRecord};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "m4a", "flac", "wav", "ogg"];

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Write a dataset manifest from one directory per genre"
)]
struct Args {
    /// Dataset root; every subdirectory except the test directory is a genre
    root: PathBuf,
    /// Subdirectory holding the songs to classify
    #[arg(long, default_value = "Trainer_MusicType3")]
    test_dir: String,
    /// Write the manifest here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn is_audio(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| {
                AUDIO_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
}

/// Audio files of one directory, as paths relative to the dataset root.
fn audio_files(root: &Path, dir_name: &str) -> Result<Vec<PathBuf>> {
    Ok(sorted_entries(&root.join(dir_name))?
        .into_iter()
        .filter(|path| is_audio(path))
        .filter_map(|path| path.file_name().map(|name| Path::new(dir_name).join(name)))
        .collect())
}

fn build_manifest(root: &Path, test_dir: &str) -> Result<DatasetManifest> {
    let genres: Vec<String> = sorted_entries(root)?
        .into_iter()
        .filter(|path| path.is_dir())
        .filter_map(|path| path.file_name()?.to_str().map(str::to_owned))
        .filter(|name| name != test_dir)
        .collect();
    if genres.is_empty() {
        bail!("no genre directories under {}", root.display());
    }

    let mut training = Vec::new();
    for genre in &genres {
        let files = audio_files(root, genre)?;
        debug!(genre, tracks = files.len(), "scanned genre directory");
        training.extend(files.into_iter().map(|path| TrackRecord::labeled(path, genre)));
    }

    let test = if root.join(test_dir).is_dir() {
        audio_files(root, test_dir)?
            .into_iter()
            .map(TrackRecord::unlabeled)
            .collect()
    } else {
        Vec::new()
    };

    let labels = LabelTable::new(genres)?;
    Ok(DatasetManifest::new(labels, training, test)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let manifest = build_manifest(&args.root, &args.test_dir)?;
    info!(
        genres = manifest.labels.len(),
        training = manifest.training.len(),
        test = manifest.test.len(),
        "built manifest"
    );
    let yaml = manifest.to_yaml_string()?;
    match &args.output {
        Some(path) => {
            fs::write(path, yaml).with_context(|| format!("writing {}", path.display()))?
        }
        None => print!("{yaml}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn genres_come_from_directories_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Techno/tech1.mp3"));
        touch(&root.join("Rock/rock2.mp3"));
        touch(&root.join("Rock/rock1.MP3"));
        touch(&root.join("Rock/notes.txt"));
        touch(&root.join("Trainer_MusicType3/mystery.m4a"));

        let manifest = build_manifest(root, "Trainer_MusicType3").unwrap();
        assert_eq!(manifest.labels.names(), &["Rock".to_string(), "Techno".to_string()]);
        let paths: Vec<_> = manifest.training.iter().map(|r| r.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("Rock/rock1.MP3"),
                PathBuf::from("Rock/rock2.mp3"),
                PathBuf::from("Techno/tech1.mp3"),
            ]
        );
        assert_eq!(manifest.training[2].genre.as_deref(), Some("Techno"));
        assert_eq!(manifest.test.len(), 1);
        assert_eq!(manifest.test[0].genre, None);
    }

    #[test]
    fn empty_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(build_manifest(dir.path(), "Test").is_err());
    }
}

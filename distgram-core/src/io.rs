use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::{env, fs, io};

/// Opens a text file as a lazy sequence of lines.
///
/// Lines are read one at a time through a `BufReader`, so memory stays
/// bounded by the longest line. Each item may carry a read error.
pub fn open_lines<P: AsRef<Path>>(filename: P) -> io::Result<impl Iterator<Item = io::Result<String>>> {
	Ok(BufReader::new(File::open(filename)?).lines())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/corpus.dat` + `"bin"` → `data/corpus.bin`
pub fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = parent.join(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/ottoman.dat"` → `"ottoman"`
/// - `"ottoman.dat"` → `"ottoman"`
pub fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().into_owned())
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Lists all files with a given extension in a directory, sorted by name.
///
/// Returns file names only (no paths). Sorting keeps merge order, and
/// therefore ranking tie-breaks, stable across platforms.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();

		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().into_owned());
			}
		}
	}

	files.sort();
	Ok(files)
}

/// Lists the corpus names (`.dat` files without extension) of a directory.
///
/// Only the final extension is removed, so `my.data.dat` is `my.data`.
pub fn list_corpora<P: AsRef<Path>>(dir: P) -> io::Result<Vec<String>> {
	list_files(dir, "dat")?.iter().map(get_filename).collect()
}

//! Fixture files the file-based scenarios read.
//!
//! Inputs that already exist under the work dir are used as they are, so a
//! project checkout with its own `inputs/` keeps them; missing ones are
//! generated. References are always derived from the inputs actually on
//! disk.

use crate::SuiteError;
use crate::oracles::{self, Classification};
use rand::Rng;
use rvt_matrix::{Matrix, MatrixError, randmat, read_matrix, write_matrix};
use std::path::Path;

/// Stem of the read_matrix fixture; `.bin` is read by the routine, `.txt`
/// holds the expected contents.
pub const READ_MATRIX_INPUT: &str = "inputs/test_read_matrix/test_input";
pub const WRITE_MATRIX_REFERENCE: &str = "outputs/test_write_matrix/reference.bin";
pub const MAIN_OUTPUT_DIR: &str = "outputs/test_basic_main";

fn matrix_err(path: &Path, source: MatrixError) -> SuiteError {
    SuiteError::Matrix {
        path: path.display().to_string(),
        source,
    }
}

fn literal(rows: u32, cols: u32, data: &[i32]) -> Result<Matrix, SuiteError> {
    Matrix::new(rows, cols, data.to_vec())
        .map_err(|err| SuiteError::Fixture(format!("built-in matrix: {err}")))
}

/// Reads `relative` under `work_dir`, writing `default` first if absent.
pub fn ensure_matrix(
    work_dir: &Path,
    relative: &str,
    default: &Matrix,
) -> Result<Matrix, SuiteError> {
    let path = work_dir.join(relative);
    if path.is_file() {
        return read_matrix(&path).map_err(|err| matrix_err(&path, err));
    }
    write_matrix(&path, default).map_err(|err| matrix_err(&path, err))?;
    log::debug!("generated fixture {}", path.display());
    Ok(default.clone())
}

fn write_fixture(work_dir: &Path, relative: &str, matrix: &Matrix) -> Result<(), SuiteError> {
    let path = work_dir.join(relative);
    write_matrix(&path, matrix).map_err(|err| matrix_err(&path, err))
}

/// Stages the read_matrix input and returns the matrix the routine should
/// produce, as stated by the text fixture.
pub fn stage_read_matrix(work_dir: &Path) -> Result<Matrix, SuiteError> {
    let text_path = work_dir.join(format!("{READ_MATRIX_INPUT}.txt"));
    let expected = if text_path.is_file() {
        let text = std::fs::read_to_string(&text_path)
            .map_err(|err| matrix_err(&text_path, MatrixError::Io(err)))?;
        Matrix::parse_text(&text).map_err(|err| matrix_err(&text_path, err))?
    } else {
        let default = literal(3, 3, &[1, 2, 3, 4, 5, 6, 7, 8, 9])?;
        if let Some(parent) = text_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| matrix_err(&text_path, MatrixError::Io(err)))?;
        }
        std::fs::write(&text_path, default.to_text())
            .map_err(|err| matrix_err(&text_path, MatrixError::Io(err)))?;
        default
    };
    ensure_matrix(work_dir, &format!("{READ_MATRIX_INPUT}.bin"), &expected)?;
    Ok(expected)
}

/// The matrix the write_matrix scenarios pass in.
pub fn write_matrix_input() -> Result<Matrix, SuiteError> {
    literal(2, 3, &[1, 2, 3, 4, 5, 6])
}

/// Writes the reference for the write_matrix scenarios, produced by the host
/// encoder independently of the routine.
pub fn stage_write_matrix_reference(work_dir: &Path) -> Result<(), SuiteError> {
    write_fixture(work_dir, WRITE_MATRIX_REFERENCE, &write_matrix_input()?)
}

/// One set of network inputs plus the expected classification.
#[derive(Debug, Clone)]
pub struct MainFixture {
    /// Program arguments: m0, m1, input, output.
    pub args: Vec<String>,
    pub reference: String,
    pub classification: Classification,
}

impl MainFixture {
    #[must_use]
    pub fn output(&self) -> &str {
        self.args.last().map_or("", String::as_str)
    }

    /// What the program prints: the label and a newline.
    #[must_use]
    pub fn expected_stdout(&self) -> String {
        format!("{}\n", self.classification.label)
    }

    /// Same arguments with the output redirected.
    #[must_use]
    pub fn with_output(&self, output: String) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(last) = args.last_mut() {
            *last = output;
        }
        args
    }
}

fn main_paths(inputs: &str) -> [String; 3] {
    [
        format!("{inputs}/m0.bin"),
        format!("{inputs}/m1.bin"),
        format!("{inputs}/inputs/input0.bin"),
    ]
}

fn finish_main_fixture(
    work_dir: &Path,
    inputs: &str,
    output_id: &str,
    [m0, m1, input]: [Matrix; 3],
) -> Result<MainFixture, SuiteError> {
    let classification = oracles::classify(&m0, &m1, &input)
        .map_err(|code| SuiteError::Fixture(format!("{inputs}: network is invalid ({code:?})")))?;
    let reference = format!("{MAIN_OUTPUT_DIR}/reference{output_id}.bin");
    write_fixture(work_dir, &reference, &classification.scores)?;
    let mut args = main_paths(inputs).to_vec();
    args.push(format!("{MAIN_OUTPUT_DIR}/student{output_id}.bin"));
    Ok(MainFixture {
        args,
        reference,
        classification,
    })
}

/// Built-in networks for `inputs/simple0` and `inputs/simple1`.
fn simple_network(index: usize) -> Result<[Matrix; 3], SuiteError> {
    let m0 = literal(2, 2, &[1, 0, 0, 1])?;
    let input = literal(2, 1, &[1, 2])?;
    let m1 = if index == 0 {
        literal(3, 2, &[1, 0, 0, 1, 1, 1])?
    } else {
        literal(3, 2, &[1, 0, 1, 1, 0, 1])?
    };
    Ok([m0, m1, input])
}

/// Stages `inputs/simple<index>/bin`, keeping any inputs already present.
pub fn stage_simple_main(work_dir: &Path, index: usize) -> Result<MainFixture, SuiteError> {
    let inputs = format!("inputs/simple{index}/bin");
    let defaults = simple_network(index)?;
    let paths = main_paths(&inputs);
    let mut staged = Vec::with_capacity(3);
    for (path, default) in paths.iter().zip(defaults.iter()) {
        staged.push(ensure_matrix(work_dir, path, default)?);
    }
    let network: [Matrix; 3] = staged
        .try_into()
        .map_err(|_| SuiteError::Fixture("expected three matrices".to_owned()))?;
    finish_main_fixture(work_dir, &inputs, &index.to_string(), network)
}

/// Writes a fresh random network to `inputs/custom<index>/bin`: m1 is n x a,
/// m0 is a x b and the input b x m, each dimension in 1..=10.
pub fn stage_random_main<R: Rng + ?Sized>(
    work_dir: &Path,
    index: usize,
    rng: &mut R,
) -> Result<MainFixture, SuiteError> {
    let inputs = format!("inputs/custom{index}/bin");
    let (n, m, a, b) = (
        rng.gen_range(1..=10),
        rng.gen_range(1..=10),
        rng.gen_range(1..=10),
        rng.gen_range(1..=10),
    );
    let network = [randmat(rng, a, b), randmat(rng, n, a), randmat(rng, b, m)];
    for (path, matrix) in main_paths(&inputs).iter().zip(network.iter()) {
        write_fixture(work_dir, path, matrix)?;
    }
    finish_main_fixture(work_dir, &inputs, &(index + 2).to_string(), network)
}

#[cfg(test)]
mod tests {
    use super::{READ_MATRIX_INPUT, stage_random_main, stage_read_matrix, stage_simple_main};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rvt_matrix::{Matrix, read_matrix, write_matrix};

    #[test]
    fn simple_networks_have_known_labels() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        let zero = stage_simple_main(dir.path(), 0).unwrap();
        assert_eq!(zero.expected_stdout(), "2\n");
        let one = stage_simple_main(dir.path(), 1).unwrap();
        assert_eq!(one.expected_stdout(), "1\n");
        assert_eq!(one.output(), "outputs/test_basic_main/student1.bin");
        let reference = read_matrix(&dir.path().join(&zero.reference)).unwrap();
        assert_eq!(reference.data, vec![1, 2, 3]);
    }

    #[test]
    fn existing_inputs_are_kept() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        let custom = Matrix::new(2, 1, vec![5, 0]).unwrap();
        write_matrix(&dir.path().join("inputs/simple0/bin/inputs/input0.bin"), &custom).unwrap();
        let fixture = stage_simple_main(dir.path(), 0).unwrap();
        assert_eq!(fixture.classification.scores.data, vec![5, 0, 5]);
        assert_eq!(fixture.classification.label, 0);
    }

    #[test]
    fn read_matrix_fixture_pairs_text_and_binary() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        let expected = stage_read_matrix(dir.path()).unwrap();
        let binary = read_matrix(&dir.path().join(format!("{READ_MATRIX_INPUT}.bin"))).unwrap();
        assert_eq!(binary, expected);
        assert!(dir.path().join(format!("{READ_MATRIX_INPUT}.txt")).is_file());
    }

    #[test]
    fn random_networks_are_seed_stable() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        let first = stage_random_main(dir.path(), 0, &mut StdRng::seed_from_u64(3)).unwrap();
        let second = stage_random_main(dir.path(), 0, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(first.classification, second.classification);
        assert_eq!(first.reference, "outputs/test_basic_main/reference2.bin");
    }
}

/*!
# Squeeze: Iterated LZ77 Optimizer.

This module contains the two public entrypoints of the crate: `lz77_optimal`,
the iterated statistics-driven optimizer, and `lz77_optimal_fixed`, a
one-shot run against the fixed Huffman tree costs.
*/

use super::{
	blocksize::calculate_block_size_dynamic,
	LZ77Store,
	stats::{
		RanState,
		SymbolStats,
	},
	ZopfliError,
	ZopfliState,
};



/// # Iterated LZ77 Parse.
///
/// Seeds statistics with a greedy parse, then repeats statistics-driven
/// squeeze passes `num_iterations` times, keeping whichever pass produces
/// the smallest true (dynamic-Huffman) block size.
///
/// `input` is the full source buffer; only the `instart..inend` window is
/// parsed. The result is written to `out_store`, which is cleared first.
///
/// ## Errors
///
/// Returns an error if an internal invariant is violated (corrupt
/// length/path data, an out-of-range index, etc.) — see the crate's error
/// handling notes. These are bugs, not data-driven failures.
pub fn lz77_optimal(
	state: &mut ZopfliState,
	input: &[u8],
	instart: usize,
	inend: usize,
	num_iterations: u32,
	out_store: &mut LZ77Store,
) -> Result<(), ZopfliError> {
	out_store.clear();
	if instart >= inend { return Ok(()); }

	let arr = &input[..inend];
	state.init_lmc(inend - instart);

	// Seed: a greedy parse gives us our first set of statistics.
	let mut current = LZ77Store::new();
	state.greedy(arr, instart, &mut current, Some(instart))?;

	let mut stats = SymbolStats::new();
	stats.load_store(&current);
	stats.crunch();

	let mut best_stats = stats;
	let mut ran = RanState::new();
	let mut best_cost = u32::MAX;
	let mut last_cost = 0_u32;
	let mut last_random_step: Option<u32> = None;

	// The open question of N == 0 is resolved by falling back to the
	// greedy seed, so nothing downstream ever sees an empty store for a
	// non-empty block.
	out_store.replace(&current);

	for iter in 0..num_iterations {
		state.optimal_run(arr, instart, Some(&stats), &mut current)?;
		let cost = calculate_block_size_dynamic(&current, 0, current.len())?;

		#[cfg(feature = "logging")]
		log::trace!("iteration {iter}: {cost} bits");

		if cost < best_cost {
			out_store.replace(&current);
			best_stats = stats;
			best_cost = cost;

			#[cfg(feature = "logging")]
			log::debug!("iteration {iter}: {cost} bits (new best)");
		}

		// Blend with the previous iteration's statistics once randomization
		// has fired at least once; otherwise just refit from scratch.
		stats.reload_store(&current, last_random_step.is_some());
		stats.crunch();

		if 5 < iter && cost == last_cost {
			stats = best_stats;
			stats.randomize(&mut ran);
			stats.crunch();
			last_random_step = Some(iter);
		}

		last_cost = cost;
	}

	Ok(())
}

/// # Fixed-Tree LZ77 Parse.
///
/// A single squeeze pass using the fixed Huffman tree costs — no
/// iteration, no statistics. Sets `state.blockstart`/`state.blockend` so a
/// downstream bitstream writer knows the range that was just parsed.
///
/// ## Errors
///
/// See [`lz77_optimal`].
pub fn lz77_optimal_fixed(
	state: &mut ZopfliState,
	input: &[u8],
	instart: usize,
	inend: usize,
	out_store: &mut LZ77Store,
) -> Result<(), ZopfliError> {
	out_store.clear();
	state.blockstart = instart;
	state.blockend = inend;
	if instart >= inend { return Ok(()); }

	let arr = &input[..inend];
	state.init_lmc(inend - instart);
	state.optimal_run(arr, instart, None, out_store)
}



#[cfg(test)]
mod test {
	use super::*;

	fn collect(store: &LZ77Store) -> Vec<(u16, i16)> {
		store.entries.iter().map(|e| (e.litlen as u16, e.dist)).collect()
	}

	#[test]
	fn t_empty_range() {
		let mut state = ZopfliState::new();
		let mut out = LZ77Store::new();
		lz77_optimal(&mut state, b"hello", 2, 2, 5, &mut out).unwrap();
		assert_eq!(out.len(), 0);
	}

	#[test]
	fn t_distinct_literals() {
		let mut state = ZopfliState::new();
		let mut out = LZ77Store::new();
		let input = [1_u8, 2, 3];
		lz77_optimal(&mut state, &input, 0, input.len(), 2, &mut out).unwrap();

		// No distance is possible among distinct bytes, so every entry must
		// be a literal.
		assert!(out.entries.iter().all(|e| e.dist <= 0));
		let total: u32 = out.entries.iter().map(|e| e.length() as u32).sum();
		assert_eq!(total as usize, input.len());
	}

	#[test]
	fn t_repeated_aaaa() {
		let mut state = ZopfliState::new();
		let mut out = LZ77Store::new();
		let input = b"aaaaaaaaaa"; // 10 bytes.
		lz77_optimal(&mut state, input, 0, input.len(), 2, &mut out).unwrap();

		// No edge should ever have length two (ZOPFLI_MIN_MATCH == 3).
		assert!(out.entries.iter().all(|e| e.length() as u16 != 2));

		let total: u32 = out.entries.iter().map(|e| e.length() as u32).sum();
		assert_eq!(total as usize, input.len());
	}

	#[test]
	fn t_abcabc_match() {
		let mut state = ZopfliState::new();
		let mut out = LZ77Store::new();
		let input = b"abcabc";
		lz77_optimal(&mut state, input, 0, input.len(), 2, &mut out).unwrap();

		// The second half should be recoverable as a distance-3 match.
		assert!(out.entries.iter().any(|e| e.dist == 3));

		let total: u32 = out.entries.iter().map(|e| e.length() as u32).sum();
		assert_eq!(total as usize, input.len());
	}

	#[test]
	fn t_rle_fast_path() {
		let mut state = ZopfliState::new();
		let mut out = LZ77Store::new();
		let input = vec![b'x'; 600];
		lz77_optimal(&mut state, &input, 0, input.len(), 1, &mut out).unwrap();

		let total: u32 = out.entries.iter().map(|e| e.length() as u32).sum();
		assert_eq!(total as usize, input.len());
		assert!(out.entries.iter().any(|e| e.length() as u16 == 258));
	}

	#[test]
	fn t_non_increasing_cost() {
		// A small deterministic PRNG stand-in: no external rand dependency,
		// just enough entropy to avoid a degenerate all-same-byte input.
		let mut seed = 0x1234_5678_u32;
		let mut input = Vec::with_capacity(4096);
		for _ in 0..4096 {
			seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
			input.push((seed >> 16) as u8);
		}

		let mut state = ZopfliState::new();
		let mut out = LZ77Store::new();
		let mut costs = Vec::new();

		for n in 0..=5_u32 {
			lz77_optimal(&mut state, &input, 0, input.len(), n, &mut out).unwrap();
			costs.push(calculate_block_size_dynamic(&out, 0, out.len()).unwrap());
		}

		// Each additional iteration budget should never leave us worse off.
		for pair in costs.windows(2) { assert!(pair[1] <= pair[0]); }
	}

	#[test]
	fn t_fixed_round_trip_lengths() {
		let mut state = ZopfliState::new();
		let mut out = LZ77Store::new();
		let input = b"abcabcabcabc";
		lz77_optimal_fixed(&mut state, input, 0, input.len(), &mut out).unwrap();

		assert_eq!(state.blockstart, 0);
		assert_eq!(state.blockend, input.len());

		let total: u32 = out.entries.iter().map(|e| e.length() as u32).sum();
		assert_eq!(total as usize, input.len());

		let _ = collect(&out);
	}
}

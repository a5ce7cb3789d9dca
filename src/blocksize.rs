/*!
# Squeeze: Block Size Estimation.

This module estimates the true, encoded bit-cost of a range of LZ77 store
entries under each of the three DEFLATE block types (uncompressed, fixed
Huffman, dynamic Huffman), and picks the cheapest. The dynamic-Huffman path
additionally tries an RLE-optimized version of the symbol counts and keeps
whichever comes out smaller.

None of this writes a bitstream — it only estimates how many bits one would
cost — so there is no `ZopfliOut` dependency here at all.
*/

use dactyl::NoHash;
use std::{
	cell::{
		Cell,
		RefCell,
	},
	collections::{
		hash_map::Entry,
		HashMap,
	},
	num::NonZeroU32,
};
use super::{
	ArrayD,
	ArrayLL,
	best_tree_size,
	DeflateSym,
	DISTANCE_BITS,
	FIXED_SYMBOLS_D,
	FIXED_SYMBOLS_LL,
	FIXED_TREE_D,
	FIXED_TREE_LL,
	LengthLimitedCodeLengths,
	LENGTH_SYMBOL_BITS,
	LZ77Store,
	zopfli_error,
	ZopfliError,
};



/// # Length Symbol Extra Bits.
const LENGTH_EXTRA_BITS: [u32; 29] = [
	0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2,
	3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

type RleCache = HashMap<u64, CacheEntry, NoHash>;

thread_local!(
	/// # Best Tree Cache.
	///
	/// The dynamic length calculations are pretty terrible and can wind up
	/// being repeated several times for a given block. To take out some of
	/// the sting from that repetition, the results are cached by content
	/// hash for the lifetime of the thread.
	static CACHE: RefCell<RleCache> = RefCell::new(HashMap::default())
);

/// # Reset Dynamic Length Cache.
///
/// Clears the thread-local tree-size cache. Callers processing independent
/// inputs back to back may wish to call this between them to bound memory
/// growth, though it is not required for correctness.
pub fn reset_dynamic_length_cache() { CACHE.with_borrow_mut(HashMap::clear); }



#[repr(u8)]
#[derive(Clone, Copy, Eq, PartialEq)]
/// # Block Type.
pub(crate) enum BlockType {
	/// # Stored (Uncompressed).
	Uncompressed = 0_u8,
	/// # Fixed Huffman Trees.
	Fixed = 1_u8,
	/// # Dynamic (Custom) Huffman Trees.
	Dynamic = 2_u8,
}



/// # Byte Range.
///
/// Return the `(instart, inend)` byte positions spanned by store entries
/// `lstart..lend`.
fn byte_range(store: &LZ77Store, lstart: usize, lend: usize) -> Result<(usize, usize), ZopfliError> {
	if lstart >= lend || lend > store.entries.len() { return Err(zopfli_error!()); }
	let instart = store.entries[lstart].pos;
	let last = &store.entries[lend - 1];
	let inend = last.pos + last.length() as usize;
	Ok((instart, inend))
}

#[allow(clippy::cast_possible_truncation)] // The maximum blocksize is only 1 million.
/// # Calculate Block Size (Uncompressed).
pub(crate) fn calculate_block_size_uncompressed(
	store: &LZ77Store,
	lstart: usize,
	lend: usize,
) -> Result<u32, ZopfliError> {
	let (instart, inend) = byte_range(store, lstart, lend)?;
	let blocksize = (inend - instart) as u32;

	// Blocks larger than u16::MAX need to be split.
	let blocks = blocksize.div_ceil(65_535);
	Ok(blocks * 40 + blocksize * 8)
}

/// # Calculate Block Size (Fixed).
pub(crate) fn calculate_block_size_fixed(
	store: &LZ77Store,
	lstart: usize,
	lend: usize,
) -> u32 {
	// The end symbol is always included.
	let mut size = FIXED_TREE_LL[256] as u32;

	// Loop the store if we have data to loop.
	let slice = store.entries.as_slice();
	if lstart < lend && lend <= slice.len() {
		for e in &slice[lstart..lend] {
			if e.dist <= 0 {
				size += FIXED_TREE_LL[e.litlen as usize] as u32;
			}
			else {
				size += u32::from(LENGTH_SYMBOL_BITS[e.litlen as usize]);
				size += FIXED_TREE_LL[e.ll_symbol as usize] as u32;
				size += u32::from(DISTANCE_BITS[e.d_symbol as usize]);
				size += FIXED_TREE_D[e.d_symbol as usize] as u32;
			}
		}
	}

	size
}

#[inline(never)]
/// # Calculate Block Size (Dynamic).
pub(crate) fn calculate_block_size_dynamic(
	store: &LZ77Store,
	lstart: usize,
	lend: usize,
) -> Result<u32, ZopfliError> {
	get_dynamic_lengths(store, lstart, lend).map(|(_, size, _, _)| size.get())
}

/// # Calculate Best Block Size (in Bits).
///
/// Computes the cost of all three block types and returns the smallest.
/// Large stores skip the (rarely competitive) fixed-tree calculation.
pub(crate) fn calculate_block_size_auto_type(
	store: &LZ77Store,
	lstart: usize,
	lend: usize,
) -> Result<u32, ZopfliError> {
	let uncompressed_cost = calculate_block_size_uncompressed(store, lstart, lend)?;

	let fixed_cost =
		if 1000 < store.len() { uncompressed_cost }
		else { calculate_block_size_fixed(store, lstart, lend) };

	let dynamic_cost = calculate_block_size_dynamic(store, lstart, lend)?;

	if uncompressed_cost < fixed_cost && uncompressed_cost < dynamic_cost {
		Ok(uncompressed_cost)
	}
	else if fixed_cost < dynamic_cost { Ok(fixed_cost) }
	else { Ok(dynamic_cost) }
}



#[derive(Clone, Copy)]
/// # Cache Entry.
struct CacheEntry {
	/// # Extended Alphabet (+ Noop Flag).
	extra: u8,
	/// # Combined Tree/Data Size.
	size: NonZeroU32,
}

impl CacheEntry {
	/// # Extra Bits.
	const MASK_EXTRA: u8 = 0b0000_0111;

	/// # Fruitless Optimization Mask.
	const MASK_NOOP: u8 = 0b0000_1000;

	/// # Extra.
	const fn extra(self) -> u8 { self.extra & Self::MASK_EXTRA }

	/// # Fruitless Optimization?
	const fn noop(self) -> bool { Self::MASK_NOOP == self.extra & Self::MASK_NOOP }

	/// # Set Fruitless Optimization.
	fn set_noop(&mut self) { self.extra |= Self::MASK_NOOP; }
}



/// # RLE-Optimized Stretches.
///
/// This iterator yields a boolean value for each entry of the source slice,
/// `true` for counts in a sequence of 5+ zeroes or 7+ (identical)
/// non-zeroes, `false` otherwise.
///
/// This moots the need to collect such values into a vector in advance and
/// reduces the number of passes required to optimize Huffman codes.
struct GoodForRle<'a> {
	counts: &'a [Cell<u32>],
	good: usize,
	bad: usize,
}

impl<'a> GoodForRle<'a> {
	/// # New Instance.
	const fn new(counts: &'a [Cell<u32>]) -> Self {
		Self { counts, good: 0, bad: 0 }
	}
}

impl<'a> Iterator for GoodForRle<'a> {
	type Item = bool;

	fn next(&mut self) -> Option<Self::Item> {
		if self.good != 0 {
			self.good -= 1;
			return Some(true);
		}
		if self.bad != 0 {
			self.bad -= 1;
			return Some(false);
		}

		if self.counts.is_empty() { return None; }

		let scratch = self.counts[0].get();
		let mut stride = 0;
		while let [count, rest @ ..] = self.counts {
			if count.get() == scratch {
				stride += 1;
				self.counts = rest;
			}
			else if stride >= 5 && (scratch == 0 || stride >= 7) {
				self.good = stride - 1;
				return Some(true);
			}
			else {
				self.bad = stride - 1;
				return Some(false);
			}
		}

		if stride >= 5 && (scratch == 0 || stride >= 7) {
			self.good = stride - 1;
			Some(true)
		}
		else {
			self.bad = stride - 1;
			Some(false)
		}
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let len = self.len();
		(len, Some(len))
	}
}

impl<'a> ExactSizeIterator for GoodForRle<'a> {
	fn len(&self) -> usize { self.good + self.bad + self.counts.len() }
}



/// # Get Dynamic Lengths.
///
/// Calculates the dynamic tree symbols and size using both the raw and
/// RLE-optimized counts, returning whichever produces the smallest output.
///
/// Note: the returned size does not include the 3-bit block header.
fn get_dynamic_lengths(store: &LZ77Store, lstart: usize, lend: usize)
-> Result<(u8, NonZeroU32, ArrayLL<DeflateSym>, ArrayD<DeflateSym>), ZopfliError> {
	fn fetch(
		cache: &mut RleCache,
		ll_counts: &ArrayLL<u32>,
		d_counts: &ArrayD<u32>,
	) -> Result<(u8, NonZeroU32, ArrayLL<DeflateSym>, ArrayD<DeflateSym>), ZopfliError> {
		let ll_lengths = ll_counts.llcl()?;
		let d_lengths = d_llcl(d_counts)?;
		let (data1, hash1) = calculate_size(cache, ll_counts, d_counts, &ll_lengths, &d_lengths)?;

		// Unless we've been here before and found optimization useless,
		// repeat the process using optimized counts and symbols.
		if ! data1.noop() {
			let (ll_lengths2, d_lengths2) = optimized_symbols(ll_counts, d_counts)?;
			let (data2, _) = calculate_size(cache, ll_counts, d_counts, &ll_lengths2, &d_lengths2)?;

			if data2.size < data1.size {
				return Ok((data2.extra(), data2.size, ll_lengths2, d_lengths2));
			}

			// Flag the original entry so we skip this dead end next time.
			if let Some(e) = cache.get_mut(&hash1) { e.set_noop(); }
		}

		Ok((data1.extra(), data1.size, ll_lengths, d_lengths))
	}

	// Pull the counts from the store.
	let (mut ll_counts, d_counts) = store.histogram(lstart, lend)?;
	ll_counts[256] = 1;

	CACHE.with_borrow_mut(|cache| fetch(cache, &ll_counts, &d_counts))
}

/// # Calculate Size.
///
/// Pull the best tree details from the cache, or calculate them fresh (and
/// cache them for next time).
fn calculate_size(
	cache: &mut RleCache,
	ll_counts: &ArrayLL<u32>,
	d_counts: &ArrayD<u32>,
	ll_lengths: &ArrayLL<DeflateSym>,
	d_lengths: &ArrayD<DeflateSym>,
) -> Result<(CacheEntry, u64), ZopfliError> {
	let hash = deflate_hash(ll_counts, d_counts, ll_lengths, d_lengths);

	let entry = match cache.entry(hash) {
		Entry::Occupied(e) => return Ok((*e.get(), hash)),
		Entry::Vacant(e) => e,
	};

	let (extra, treesize) = best_tree_size(ll_lengths, d_lengths)?;
	let datasize = calculate_size_data(ll_counts, d_counts, ll_lengths, d_lengths);
	let size = NonZeroU32::new(treesize.saturating_add(datasize).max(1)).ok_or(zopfli_error!())?;
	let out = CacheEntry { extra, size };

	entry.insert(out);
	Ok((out, hash))
}

#[inline(never)]
/// # Calculate Dynamic Data Block Size.
fn calculate_size_data(
	ll_counts: &ArrayLL<u32>,
	d_counts: &ArrayD<u32>,
	ll_lengths: &ArrayLL<DeflateSym>,
	d_lengths: &ArrayD<DeflateSym>,
) -> u32 {
	// The early lengths and counts.
	let a = ll_lengths.iter().copied()
		.zip(ll_counts.iter().copied())
		.take(256)
		.map(|(ll, lc)| (ll as u32) * lc)
		.sum::<u32>();

	// The lengths and counts with extra bits.
	let b = ll_lengths[257..].iter().copied()
		.zip(ll_counts[257..].iter().copied())
		.zip(LENGTH_EXTRA_BITS)
		.map(|((ll, lc), lbit)| (ll as u32 + lbit) * lc)
		.sum::<u32>();

	// The distance lengths, counts, and extra bits.
	let c = d_lengths.iter().copied()
		.zip(d_counts.iter().copied())
		.zip(DISTANCE_BITS)
		.take(30)
		.map(|((dl, dc), dbit)| (dl as u32 + u32::from(dbit)) * dc)
		.sum::<u32>();

	a + b + c + ll_lengths[256] as u32
}

/// # Dynamic Length-Limited Code Lengths.
///
/// Calculate, patch, and return the distance code length symbols.
fn d_llcl(d_counts: &ArrayD<u32>)
-> Result<ArrayD<DeflateSym>, ZopfliError> {
	let mut d_lengths = d_counts.llcl()?;

	// Buggy decoders require at least two non-zero distances.
	let mut one: Option<bool> = None;
	for (i, dist) in d_lengths.iter().copied().enumerate().take(30) {
		if ! dist.is_zero() && one.replace(i == 0).is_some() { return Ok(d_lengths); }
	}

	match one {
		Some(true) => { d_lengths[1] = DeflateSym::D01; },
		Some(false) => { d_lengths[0] = DeflateSym::D01; },
		None => {
			d_lengths[0] = DeflateSym::D01;
			d_lengths[1] = DeflateSym::D01;
		},
	}

	Ok(d_lengths)
}

/// # Hash Counts and Symbols.
///
/// Calculate a hash for the set, independent of the cache map itself so
/// lookups can be repeated cheaply if needed.
fn deflate_hash(
	ll_counts: &ArrayLL<u32>,
	d_counts: &ArrayD<u32>,
	ll_lengths: &ArrayLL<DeflateSym>,
	d_lengths: &ArrayD<DeflateSym>,
) -> u64 {
	use ahash::RandomState;
	use std::hash::{BuildHasher, Hash, Hasher};

	#[allow(unsafe_code)]
	/// # As Bytes.
	const fn deflate_bytes<const N: usize>(arr: &[DeflateSym; N]) -> &[u8; N] {
		// Safety: DeflateSym has the same size and alignment as u8.
		const {
			assert!(std::mem::size_of::<[DeflateSym; N]>() == std::mem::size_of::<[u8; N]>());
			assert!(std::mem::align_of::<[DeflateSym; N]>() == std::mem::align_of::<[u8; N]>());
		}
		unsafe { &* arr.as_ptr().cast() }
	}

	let mut h = RandomState::with_seeds(
		0x8596_cc44_bef0_1aa0,
		0x98d4_0948_da60_19ae,
		0x49f1_3013_c503_a6aa,
		0xc4d7_82ff_3c9f_7bef,
	).build_hasher();

	ll_counts.hash(&mut h);
	d_counts.hash(&mut h);
	deflate_bytes(ll_lengths).hash(&mut h);
	deflate_bytes(d_lengths).hash(&mut h);

	h.finish()
}

/// # Get RLE-Optimized Symbols.
///
/// Copy and optimize the counts, then recrunch and return their
/// length-limited symbols (the optimized counts themselves serve no further
/// purpose once this is done).
fn optimized_symbols(ll_counts: &ArrayLL<u32>, d_counts: &ArrayD<u32>)
-> Result<(ArrayLL<DeflateSym>, ArrayD<DeflateSym>), ZopfliError> {
	#[inline(never)]
	fn optimized_counts<const N: usize>(counts: &[u32; N]) -> [u32; N] {
		let mut counts2 = *counts;
		optimize_huffman_for_rle(&mut counts2);
		counts2
	}

	let ll_counts2 = optimized_counts(ll_counts);
	let d_counts2 = optimized_counts(d_counts);
	let ll_lengths2 = ll_counts2.llcl()?;
	let d_lengths2 = d_llcl(&d_counts2)?;

	Ok((ll_lengths2, d_lengths2))
}

#[allow(clippy::inline_always, clippy::integer_division)]
#[inline(always)]
/// # Optimize Huffman RLE Compression.
///
/// Change the population counts to potentially improve Huffman tree
/// compression, particularly the RLE part.
fn optimize_huffman_for_rle(mut counts: &mut [u32]) {
	// Convert counts to a proper slice with trailing zeroes trimmed.
	while let [ rest @ .., 0 ] = counts { counts = rest; }
	if counts.is_empty() { return; }

	// We need to read and write simultaneously; the Cell trick keeps us
	// safe without unsafe code.
	let counts = Cell::from_mut(counts).as_slice_of_cells();

	let mut stride: u32 = 0;
	let mut scratch: u32 = counts[0].get();
	let mut sum: u32 = 0;
	for (i, (count, good)) in counts.iter().map(Cell::get).zip(GoodForRle::new(counts)).enumerate() {
		if good || count.abs_diff(scratch) >= 4 {
			if sum != 0 && stride >= 4 {
				let v = u32::max((sum + stride / 2) / stride, 1);
				if let Some(from) = i.checked_sub(stride as usize) {
					for c in &counts[from..i] { c.set(v); }
				}
			}

			stride = 0;
			sum = 0;

			scratch = counts.get(i..i + 4).map_or(
				count,
				|c| c.iter().fold(2, |a, c| a + c.get()) / 4
			);
		}

		stride += 1;
		sum += count;
	}

	// Collapse the trailing stride, if any.
	if sum != 0 && stride >= 4 {
		let v = u32::max((sum + stride / 2) / stride, 1);
		if let Some(from) = counts.len().checked_sub(stride as usize) {
			for c in &counts[from..] { c.set(v); }
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_fixed_symbols() {
		assert_eq!(
			ArrayLL::<u32>::llcl_symbols(&FIXED_TREE_LL),
			Ok(FIXED_SYMBOLS_LL),
		);
		assert_eq!(
			ArrayD::<u32>::llcl_symbols(&FIXED_TREE_D),
			Ok(FIXED_SYMBOLS_D),
		);
	}

	#[test]
	fn t_good_for_rle() {
		for c in [
			[196, 23, 10, 12, 5, 4, 1, 23, 8, 2, 6, 5, 0, 0, 0, 29, 5, 0, 0, 4, 4, 1, 0, 5, 2, 0, 0, 1, 4, 0, 1, 34, 10, 5, 7, 2, 1, 2, 0, 0, 3, 2, 5, 0, 1, 0, 0, 4, 2, 1, 0, 0, 1, 1, 0, 1, 1, 2, 0, 1, 4, 1, 5, 47].as_mut_slice(),
			[2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 122, 0, 288, 11, 41, 6, 5, 2, 0, 0, 0, 1].as_mut_slice(),
		] {
			let c = Cell::from_mut(c).as_slice_of_cells();

			let good = GoodForRle::new(c);
			assert_eq!(good.len(), c.len(), "GoodForRle iterator count does not match source.");

			let good = good.collect::<Vec<bool>>();
			assert_eq!(good.len(), c.len(), "Collected GoodForRle iterator count does not match source.");
		}
	}
}

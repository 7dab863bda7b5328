//! GLRS, the native raster file format.
//!
//! All values little endian:
//!
//! | field          | type     |
//! |----------------|----------|
//! | magic `GLRS`   | [u8; 4]  |
//! | version (1)    | u16      |
//! | bands          | u16      |
//! | width          | u32      |
//! | height         | u32      |
//! | transform      | [f64; 6] |
//! | pixel size x,y | [f64; 2] |
//! | no-data (NaN = none) | f64 |
//! | samples        | f32, band sequential, row major |

use crate::{GeoTransform, Raster, RasterError, SampleMode, SampleStore, C};
use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use log::debug;
use memmap2::Mmap;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    mem::size_of,
    path::Path,
};

const MAGIC: [u8; 4] = *b"GLRS";
const VERSION: u16 = 1;

/// Upper bound on samples reserved ahead of reading them.
const PREALLOC_SAMPLES: usize = 1 << 20;

/// Encoded header length in bytes.
pub const HEADER_LEN: usize = 4 + 2 + 2 + 4 + 4 + 6 * 8 + 2 * 8 + 8;

struct Header {
    bands: usize,
    dimensions: (usize, usize),
    transform: GeoTransform,
    pixel_size: (C, C),
    nodata: Option<C>,
}

impl Header {
    fn read<R: Read>(rdr: &mut R) -> Result<Self, RasterError> {
        let mut magic = [0_u8; 4];
        rdr.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(RasterError::Magic(magic));
        }
        let version = rdr.read_u16::<LE>()?;
        if version != VERSION {
            return Err(RasterError::Version(version));
        }
        let bands = usize::from(rdr.read_u16::<LE>()?);
        let width = rdr.read_u32::<LE>()? as usize;
        let height = rdr.read_u32::<LE>()? as usize;
        let mut coeffs = [0.0; 6];
        for c in &mut coeffs {
            *c = rdr.read_f64::<LE>()?;
        }
        let pixel_size = (rdr.read_f64::<LE>()?, rdr.read_f64::<LE>()?);
        let nodata = Some(rdr.read_f64::<LE>()?).filter(|v| !v.is_nan());
        if width == 0 || height == 0 || bands == 0 {
            return Err(RasterError::Empty { width, height });
        }
        Ok(Self {
            bands,
            dimensions: (width, height),
            transform: GeoTransform::from_gdal(coeffs),
            pixel_size,
            nodata,
        })
    }

    fn sample_count(&self) -> Result<usize, RasterError> {
        let (width, height) = self.dimensions;
        self.bands
            .checked_mul(width)
            .and_then(|n| n.checked_mul(height))
            .ok_or(RasterError::TooLarge {
                bands: self.bands,
                width,
                height,
            })
    }

    /// Errors unless `len` encoded bytes hold exactly this header's
    /// samples.
    fn check_len(&self, len: u64) -> Result<usize, RasterError> {
        let expected = self.sample_count()?;
        let actual = usize::try_from(len.saturating_sub(HEADER_LEN as u64) / size_of::<f32>() as u64)
            .unwrap_or(usize::MAX);
        if actual != expected {
            return Err(RasterError::SampleCount { expected, actual });
        }
        Ok(expected)
    }

    fn into_raster(self, samples: SampleStore) -> Raster {
        Raster {
            dimensions: self.dimensions,
            bands: self.bands,
            transform: self.transform,
            pixel_size: self.pixel_size,
            nodata: self.nodata,
            samples,
        }
    }
}

impl Raster {
    /// Returns a raster read from the GLRS file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, mode: SampleMode) -> Result<Self, RasterError> {
        debug!("opening {:?} ({mode:?})", path.as_ref());
        match mode {
            SampleMode::InMem => Self::load(path),
            SampleMode::MemMap => Self::memmap(path),
        }
    }

    /// Returns a raster decoded into memory from the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let mut rdr = BufReader::new(file);
        let header = Header::read(&mut rdr)?;
        let expected = header.check_len(len)?;
        let samples = read_samples(&mut rdr, expected)?;
        Ok(header.into_raster(samples))
    }

    /// Returns a raster using the memory-mapped file as storage.
    pub fn memmap<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let header = Header::read(&mut &mmap[..])?;
        header.check_len(mmap.len() as u64)?;
        Ok(header.into_raster(SampleStore::MemMap {
            map: mmap,
            offset: HEADER_LEN,
        }))
    }

    /// Returns a raster decoded from GLRS bytes.
    ///
    /// The header is not trusted: a reader that runs out before the
    /// advertised sample count is an error, not an allocation of that
    /// size.
    pub fn from_reader<R: Read>(rdr: &mut R) -> Result<Self, RasterError> {
        let header = Header::read(rdr)?;
        let expected = header.sample_count()?;
        let samples = read_samples(rdr, expected)?;
        Ok(header.into_raster(samples))
    }

    /// Writes `self` as GLRS to the file at `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RasterError> {
        let mut wtr = BufWriter::new(File::create(path)?);
        self.to_writer(&mut wtr)?;
        wtr.flush()?;
        Ok(())
    }

    /// Writes `self` as GLRS.
    ///
    /// Fails with [`RasterError::TooLarge`] when the band count or a
    /// dimension does not fit its header field.
    pub fn to_writer<W: Write>(&self, wtr: &mut W) -> Result<(), RasterError> {
        let (width, height) = self.dimensions;
        let too_large = || RasterError::TooLarge {
            bands: self.bands,
            width,
            height,
        };
        let bands = u16::try_from(self.bands).map_err(|_| too_large())?;
        let width = u32::try_from(width).map_err(|_| too_large())?;
        let height = u32::try_from(height).map_err(|_| too_large())?;
        wtr.write_all(&MAGIC)?;
        wtr.write_u16::<LE>(VERSION)?;
        wtr.write_u16::<LE>(bands)?;
        wtr.write_u32::<LE>(width)?;
        wtr.write_u32::<LE>(height)?;
        for c in self.transform.to_gdal() {
            wtr.write_f64::<LE>(c)?;
        }
        wtr.write_f64::<LE>(self.pixel_size.0)?;
        wtr.write_f64::<LE>(self.pixel_size.1)?;
        wtr.write_f64::<LE>(self.nodata.unwrap_or(C::NAN))?;
        for idx in 0..self.bands * self.len() {
            wtr.write_f32::<LE>(self.samples.get_unchecked(idx) as f32)?;
        }
        Ok(())
    }

    /// Returns `self` encoded as GLRS bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RasterError> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.bands * self.len() * size_of::<f32>());
        self.to_writer(&mut buf)?;
        Ok(buf)
    }
}

fn read_samples<R: Read>(rdr: &mut R, expected: usize) -> Result<SampleStore, RasterError> {
    let mut samples = Vec::with_capacity(expected.min(PREALLOC_SAMPLES));
    for _ in 0..expected {
        match rdr.read_f32::<LE>() {
            Ok(sample) => samples.push(C::from(sample)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(RasterError::SampleCount {
                    expected,
                    actual: samples.len(),
                })
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(SampleStore::InMem(samples.into_boxed_slice()))
}
